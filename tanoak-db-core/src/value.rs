//! Typed values handled by lexicoders
//!
//! [`Value`] is the closed set of domain types that lexicoders encode into
//! order-preserving key bytes. It is distinct from record field values (which
//! are arbitrary JSON); only keys need a typed, orderable representation.

use chrono::{DateTime, Utc};

/// A typed value that a lexicoder can encode into key bytes.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Raw bytes (identity coder)
    Bytes(Vec<u8>),
    /// UTF-8 text
    Text(String),
    /// Signed 64-bit integer
    Long(i64),
    /// IEEE-754 double (NaN is rejected by the coder)
    Double(f64),
    /// Point in time, millisecond precision
    Instant(DateTime<Utc>),
    /// Element list for sequence and tuple coders
    List(Vec<Value>),
}

impl Value {
    /// One-word name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "string",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Instant(_) => "instant",
            Value::List(_) => "list",
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Instant(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}
