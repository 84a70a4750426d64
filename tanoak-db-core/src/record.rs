//! Records: key + field map
//!
//! A record pairs a [`Key`] with a field map. Field values are arbitrary JSON;
//! field maps live in `BTreeMap` so every serialization is canonical (sorted
//! by field name), which content addressing depends on.

use crate::key::Key;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A record's field map: field name -> arbitrary JSON value.
///
/// The empty map is a legal value (presence with no fields).
pub type Fields = BTreeMap<String, serde_json::Value>;

/// A stored record: key plus field map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record key
    pub key: Key,
    /// Field name -> value
    pub fields: Fields,
}

impl Record {
    /// Create a record.
    pub fn new(key: Key, fields: Fields) -> Self {
        Self { key, fields }
    }

    /// Create a record with no fields (presence marker).
    pub fn empty(key: Key) -> Self {
        Self {
            key,
            fields: Fields::new(),
        }
    }

    /// Project this record's fields onto a field-name set.
    pub fn project(&self, fields: &BTreeSet<String>) -> Record {
        let projected = self
            .fields
            .iter()
            .filter(|(name, _)| fields.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Record {
            key: self.key.clone(),
            fields: projected,
        }
    }
}

/// Check that a record slice is strictly ascending by key.
pub fn assert_ascending(records: &[Record]) -> crate::error::Result<()> {
    for pair in records.windows(2) {
        if pair[0].key >= pair[1].key {
            return Err(crate::error::Error::invalid_argument(format!(
                "records out of order: {} !< {}",
                pair[0].key, pair[1].key
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(b: &[u8]) -> Key {
        Key::from_slice(b).unwrap()
    }

    #[test]
    fn test_project() {
        let mut fields = Fields::new();
        fields.insert("a".to_string(), json!(1));
        fields.insert("b".to_string(), json!("x"));
        let rec = Record::new(key(&[1]), fields);

        let wanted: BTreeSet<String> = ["b".to_string()].into();
        let projected = rec.project(&wanted);
        assert_eq!(projected.fields.len(), 1);
        assert_eq!(projected.fields["b"], json!("x"));
    }

    #[test]
    fn test_assert_ascending() {
        let recs = vec![Record::empty(key(&[1])), Record::empty(key(&[2]))];
        assert!(assert_ascending(&recs).is_ok());

        let dup = vec![Record::empty(key(&[1])), Record::empty(key(&[1]))];
        assert!(assert_ascending(&dup).is_err());

        let bad = vec![Record::empty(key(&[2])), Record::empty(key(&[1]))];
        assert!(assert_ascending(&bad).is_err());
    }
}
