//! Lexicoders: order-preserving key codecs
//!
//! A lexicoder is a bidirectional codec between values of some domain type
//! and non-empty byte sequences, with the central property that for all
//! `a`, `b`: `compare(a, b)` and the unsigned lexicographic comparison of
//! `encode(a)` and `encode(b)` have the same sign. All index structure —
//! range queries, splits, merges — reduces to byte-wise comparison, so any
//! typed ordering must be reducible to that single primitive.
//!
//! Concrete coders:
//!
//! - **bytes** — identity; rejects empty input in both directions
//! - **string** — UTF-8 text; rejects empty strings
//! - **long** — 8 bytes big-endian with the sign bit flipped
//! - **double** — IEEE-754 bit tricks feeding the long byte path
//! - **instant** — millis-since-epoch through the long coder
//! - **sequence** — variable-length element list with escaped separators
//! - **tuple** — fixed-arity composite
//! - **reverse** — byte-complement wrapper producing descending order
//!
//! Coders are self-describing: [`Lexicoder::config`] returns a
//! [`CoderConfig`] tag, and [`coder_for`] reconstructs a coder from one.
//! Configs round-trip through a compact JSON form (a bare tag string, or a
//! tag-headed array with parameters).

mod composite;
mod primitive;

pub use composite::{escape_bytes, unescape_bytes, ReverseCoder, SequenceCoder, TupleCoder};
pub use primitive::{BytesCoder, DoubleCoder, InstantCoder, LongCoder, StringCoder};

use crate::error::{Error, Result};
use crate::value::Value;
use std::fmt::Debug;

/// An order-preserving codec between [`Value`]s and key bytes.
pub trait Lexicoder: Debug + Send + Sync {
    /// Self-describing configuration tag for this coder.
    fn config(&self) -> CoderConfig;

    /// Encode a value into key bytes.
    ///
    /// Fails with invalid-argument for values outside the coder's domain
    /// (wrong variant, empty input where forbidden, NaN, wrong arity).
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    /// Decode key bytes back into a value.
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

/// Self-describing lexicoder configuration.
///
/// The JSON rendering is the tag keyword alone (`"long"`) or a tag-headed
/// array carrying parameters (`["tuple", "string", "long"]`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoderConfig {
    /// Identity over raw bytes
    Bytes,
    /// UTF-8 text (the only supported charset)
    String,
    /// Signed 64-bit integer
    Long,
    /// IEEE-754 double
    Double,
    /// Millisecond-precision instant
    Instant,
    /// Variable-length list of one element type
    Sequence(Box<CoderConfig>),
    /// Fixed-arity heterogeneous composite
    Tuple(Vec<CoderConfig>),
    /// Order-reversing wrapper
    Reverse(Box<CoderConfig>),
}

impl CoderConfig {
    /// The head tag keyword.
    pub fn tag(&self) -> &'static str {
        match self {
            CoderConfig::Bytes => "bytes",
            CoderConfig::String => "string",
            CoderConfig::Long => "long",
            CoderConfig::Double => "double",
            CoderConfig::Instant => "instant",
            CoderConfig::Sequence(_) => "sequence",
            CoderConfig::Tuple(_) => "tuple",
            CoderConfig::Reverse(_) => "reverse",
        }
    }

    /// Render as the compact JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            CoderConfig::Bytes
            | CoderConfig::String
            | CoderConfig::Long
            | CoderConfig::Double
            | CoderConfig::Instant => Json::String(self.tag().to_string()),
            CoderConfig::Sequence(elem) => {
                Json::Array(vec![Json::String("sequence".into()), elem.to_json()])
            }
            CoderConfig::Tuple(elems) => {
                let mut parts = vec![Json::String("tuple".into())];
                parts.extend(elems.iter().map(|e| e.to_json()));
                Json::Array(parts)
            }
            CoderConfig::Reverse(inner) => {
                Json::Array(vec![Json::String("reverse".into()), inner.to_json()])
            }
        }
    }

    /// Parse the compact JSON form.
    ///
    /// Unknown tags and wrong parameter counts fail with unsupported-config.
    pub fn from_json(value: &serde_json::Value) -> Result<CoderConfig> {
        use serde_json::Value as Json;
        match value {
            Json::String(tag) => Self::parse_tag(tag, &[]),
            Json::Array(parts) => {
                let tag = parts
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| Error::unsupported_config("coder config array missing tag"))?;
                Self::parse_tag(tag, &parts[1..])
            }
            other => Err(Error::unsupported_config(format!(
                "coder config must be a tag or tag-headed array, got {}",
                other
            ))),
        }
    }

    fn parse_tag(tag: &str, params: &[serde_json::Value]) -> Result<CoderConfig> {
        let expect_arity = |n: usize| -> Result<()> {
            if params.len() != n {
                return Err(Error::unsupported_config(format!(
                    "coder '{}' takes {} parameter(s), got {}",
                    tag,
                    n,
                    params.len()
                )));
            }
            Ok(())
        };

        match tag {
            "bytes" => {
                expect_arity(0)?;
                Ok(CoderConfig::Bytes)
            }
            "string" => {
                // Optional charset parameter; only UTF-8 is supported.
                if let Some(charset) = params.first() {
                    expect_arity(1)?;
                    match charset.as_str() {
                        Some(cs) if cs.eq_ignore_ascii_case("utf-8") => {}
                        other => {
                            return Err(Error::unsupported_config(format!(
                                "string coder charset {:?} is not supported",
                                other
                            )))
                        }
                    }
                }
                Ok(CoderConfig::String)
            }
            "long" => {
                expect_arity(0)?;
                Ok(CoderConfig::Long)
            }
            "double" => {
                expect_arity(0)?;
                Ok(CoderConfig::Double)
            }
            "instant" => {
                expect_arity(0)?;
                Ok(CoderConfig::Instant)
            }
            "sequence" => {
                expect_arity(1)?;
                Ok(CoderConfig::Sequence(Box::new(Self::from_json(&params[0])?)))
            }
            "tuple" => {
                if params.is_empty() {
                    return Err(Error::unsupported_config(
                        "tuple coder needs at least one element coder",
                    ));
                }
                let elems = params.iter().map(Self::from_json).collect::<Result<_>>()?;
                Ok(CoderConfig::Tuple(elems))
            }
            "reverse" => {
                expect_arity(1)?;
                Ok(CoderConfig::Reverse(Box::new(Self::from_json(&params[0])?)))
            }
            other => Err(Error::unsupported_config(format!(
                "unknown lexicoder tag '{}'",
                other
            ))),
        }
    }
}

impl serde::Serialize for CoderConfig {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for CoderConfig {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        CoderConfig::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// Build a lexicoder from its configuration.
///
/// Dispatches on the tag head; composite configs recurse so composite coders
/// own their element coders.
pub fn coder_for(config: &CoderConfig) -> Box<dyn Lexicoder> {
    match config {
        CoderConfig::Bytes => Box::new(BytesCoder),
        CoderConfig::String => Box::new(StringCoder),
        CoderConfig::Long => Box::new(LongCoder),
        CoderConfig::Double => Box::new(DoubleCoder),
        CoderConfig::Instant => Box::new(InstantCoder),
        CoderConfig::Sequence(elem) => Box::new(SequenceCoder::new(coder_for(elem))),
        CoderConfig::Tuple(elems) => {
            Box::new(TupleCoder::new(elems.iter().map(coder_for).collect()))
        }
        CoderConfig::Reverse(inner) => Box::new(ReverseCoder::new(coder_for(inner))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_json_round_trip() {
        let configs = [
            CoderConfig::Bytes,
            CoderConfig::String,
            CoderConfig::Long,
            CoderConfig::Double,
            CoderConfig::Instant,
            CoderConfig::Sequence(Box::new(CoderConfig::Long)),
            CoderConfig::Tuple(vec![CoderConfig::String, CoderConfig::Long]),
            CoderConfig::Reverse(Box::new(CoderConfig::Instant)),
        ];
        for config in configs {
            let parsed = CoderConfig::from_json(&config.to_json()).unwrap();
            assert_eq!(parsed, config);
        }
    }

    #[test]
    fn test_config_parses_compact_forms() {
        assert_eq!(
            CoderConfig::from_json(&json!("long")).unwrap(),
            CoderConfig::Long
        );
        assert_eq!(
            CoderConfig::from_json(&json!(["string", "UTF-8"])).unwrap(),
            CoderConfig::String
        );
        assert_eq!(
            CoderConfig::from_json(&json!(["tuple", "string", "long"])).unwrap(),
            CoderConfig::Tuple(vec![CoderConfig::String, CoderConfig::Long])
        );
    }

    #[test]
    fn test_config_rejects_unknown_tag() {
        let err = CoderConfig::from_json(&json!("varint")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfig(_)));
    }

    #[test]
    fn test_config_rejects_wrong_arity() {
        assert!(CoderConfig::from_json(&json!(["long", 8])).is_err());
        assert!(CoderConfig::from_json(&json!(["sequence"])).is_err());
        assert!(CoderConfig::from_json(&json!(["tuple"])).is_err());
        assert!(CoderConfig::from_json(&json!(["string", "latin-1"])).is_err());
    }

    #[test]
    fn test_factory_reports_config() {
        let config = CoderConfig::Tuple(vec![
            CoderConfig::String,
            CoderConfig::Reverse(Box::new(CoderConfig::Long)),
        ]);
        let coder = coder_for(&config);
        assert_eq!(coder.config(), config);
    }
}
