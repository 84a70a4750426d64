//! Tree parameters
//!
//! [`TreeParams`] carries the configuration the data tree is built with:
//! branching factor, partition record limit, column families, and the key
//! lexicoder config. Parameters are validated once at construction; the
//! update and read paths assume they hold.

use crate::error::{Error, Result};
use crate::lexicoder::CoderConfig;
use crate::node::BASE_FAMILY;
use crate::record::Fields;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default maximum children per index node.
pub const DEFAULT_BRANCHING_FACTOR: usize = 256;

/// Smallest permitted branching factor.
pub const MIN_BRANCHING_FACTOR: usize = 4;

/// Default maximum records per partition.
pub const DEFAULT_PARTITION_LIMIT: usize = 1000;

/// Configuration for a data tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum children per index node (>= 4)
    pub branching_factor: usize,
    /// Maximum records per partition (>= 1)
    pub partition_limit: usize,
    /// Family name -> owned field names; disjoint, `base` reserved
    pub families: BTreeMap<String, BTreeSet<String>>,
    /// Lexicoder configuration for this tree's keys
    pub key_coder: CoderConfig,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            branching_factor: DEFAULT_BRANCHING_FACTOR,
            partition_limit: DEFAULT_PARTITION_LIMIT,
            families: BTreeMap::new(),
            key_coder: CoderConfig::Bytes,
        }
    }
}

impl TreeParams {
    /// Create parameters, validating all bounds and family constraints.
    pub fn new(
        branching_factor: usize,
        partition_limit: usize,
        families: BTreeMap<String, BTreeSet<String>>,
        key_coder: CoderConfig,
    ) -> Result<Self> {
        let params = Self {
            branching_factor,
            partition_limit,
            families,
            key_coder,
        };
        params.validate()?;
        Ok(params)
    }

    /// Small bounds for tests: splits and merges trigger with a handful of
    /// records.
    pub fn small() -> Self {
        Self {
            branching_factor: 4,
            partition_limit: 4,
            families: BTreeMap::new(),
            key_coder: CoderConfig::Bytes,
        }
    }

    /// Check bounds and family constraints.
    pub fn validate(&self) -> Result<()> {
        if self.branching_factor < MIN_BRANCHING_FACTOR {
            return Err(Error::invalid_argument(format!(
                "branching factor {} below minimum {}",
                self.branching_factor, MIN_BRANCHING_FACTOR
            )));
        }
        if self.partition_limit < 1 {
            return Err(Error::invalid_argument("partition limit must be >= 1"));
        }
        if self.families.contains_key(BASE_FAMILY) {
            return Err(Error::invalid_argument(format!(
                "family name '{}' is reserved",
                BASE_FAMILY
            )));
        }
        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        for (family, fields) in &self.families {
            for field in fields {
                if let Some(prior) = seen.insert(field.as_str(), family.as_str()) {
                    return Err(Error::invalid_argument(format!(
                        "field '{}' claimed by both '{}' and '{}'",
                        field, prior, family
                    )));
                }
            }
        }
        Ok(())
    }

    /// Minimum children for a non-root index node: ceil(b / 2).
    pub fn min_children(&self) -> usize {
        self.branching_factor.div_ceil(2)
    }

    /// Minimum records for a non-singleton partition: ceil(L / 2).
    pub fn min_partition(&self) -> usize {
        self.partition_limit.div_ceil(2)
    }

    /// Split a record's fields into per-family partial maps.
    ///
    /// Every configured family gets the fields it claims; `base` receives
    /// everything unclaimed. The `base` entry is always present, possibly
    /// empty (a presence marker).
    pub fn split_fields(&self, fields: &Fields) -> BTreeMap<String, Fields> {
        let mut split: BTreeMap<String, Fields> = BTreeMap::new();
        split.insert(BASE_FAMILY.to_string(), Fields::new());

        'fields: for (name, value) in fields {
            for (family, owned) in &self.families {
                if owned.contains(name) {
                    split
                        .entry(family.clone())
                        .or_default()
                        .insert(name.clone(), value.clone());
                    continue 'fields;
                }
            }
            split
                .get_mut(BASE_FAMILY)
                .expect("base entry present")
                .insert(name.clone(), value.clone());
        }
        split
    }

    /// The families whose tablets must be read to satisfy a field request.
    pub fn families_for_fields(&self, fields: Option<&BTreeSet<String>>) -> BTreeSet<String> {
        families_for_fields(&self.families, fields)
    }
}

/// The minimum family set needed to satisfy a field request, for a given
/// family definition.
///
/// Includes `base` whenever any requested field is not owned by a configured
/// family. `None` means all fields: every family plus base.
pub fn families_for_fields(
    families: &BTreeMap<String, BTreeSet<String>>,
    fields: Option<&BTreeSet<String>>,
) -> BTreeSet<String> {
    let mut wanted = BTreeSet::new();
    match fields {
        None => {
            wanted.insert(BASE_FAMILY.to_string());
            wanted.extend(families.keys().cloned());
        }
        Some(requested) => {
            for field in requested {
                match families.iter().find(|(_, owned)| owned.contains(field)) {
                    Some((family, _)) => {
                        wanted.insert(family.clone());
                    }
                    None => {
                        wanted.insert(BASE_FAMILY.to_string());
                    }
                }
            }
        }
    }
    wanted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn families(defs: &[(&str, &[&str])]) -> BTreeMap<String, BTreeSet<String>> {
        defs.iter()
            .map(|(name, fields)| {
                (
                    name.to_string(),
                    fields.iter().map(|f| f.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_defaults() {
        let params = TreeParams::default();
        assert_eq!(params.branching_factor, 256);
        assert_eq!(params.partition_limit, 1000);
        assert_eq!(params.min_children(), 128);
        assert_eq!(params.min_partition(), 500);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_bounds() {
        assert!(TreeParams::new(3, 10, BTreeMap::new(), CoderConfig::Bytes).is_err());
        assert!(TreeParams::new(4, 0, BTreeMap::new(), CoderConfig::Bytes).is_err());
    }

    #[test]
    fn test_rejects_reserved_and_overlapping_families() {
        assert!(TreeParams::new(
            4,
            10,
            families(&[("base", &["x"])]),
            CoderConfig::Bytes
        )
        .is_err());

        assert!(TreeParams::new(
            4,
            10,
            families(&[("a", &["x", "y"]), ("b", &["y"])]),
            CoderConfig::Bytes
        )
        .is_err());
    }

    #[test]
    fn test_split_fields() {
        let params = TreeParams::new(
            4,
            10,
            families(&[("stats", &["count", "sum"])]),
            CoderConfig::Bytes,
        )
        .unwrap();

        let mut fields = Fields::new();
        fields.insert("count".to_string(), json!(3));
        fields.insert("label".to_string(), json!("x"));

        let split = params.split_fields(&fields);
        assert_eq!(split["stats"].len(), 1);
        assert_eq!(split["base"].len(), 1);
        assert!(split["base"].contains_key("label"));
    }

    #[test]
    fn test_split_fields_empty_map_keeps_base() {
        let params = TreeParams::default();
        let split = params.split_fields(&Fields::new());
        assert!(split["base"].is_empty());
    }

    #[test]
    fn test_families_for_fields() {
        let params = TreeParams::new(
            4,
            10,
            families(&[("stats", &["count"]), ("text", &["body"])]),
            CoderConfig::Bytes,
        )
        .unwrap();

        // Covered entirely by one family
        let wanted = params.families_for_fields(Some(&["count".to_string()].into()));
        assert_eq!(wanted, ["stats".to_string()].into());

        // Uncovered field pulls in base
        let wanted =
            params.families_for_fields(Some(&["count".to_string(), "other".to_string()].into()));
        assert_eq!(wanted, ["base".to_string(), "stats".to_string()].into());

        // No projection reads everything
        let wanted = params.families_for_fields(None);
        assert_eq!(
            wanted,
            ["base".to_string(), "stats".to_string(), "text".to_string()].into()
        );
    }
}
