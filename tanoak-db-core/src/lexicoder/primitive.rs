//! Primitive lexicoders: bytes, string, long, double, instant

use super::{CoderConfig, Lexicoder};
use crate::error::{Error, Result};
use crate::value::Value;
use chrono::{TimeZone, Utc};

const SIGN_BIT: u64 = 1 << 63;

/// Encode a signed long as 8 big-endian bytes with the sign bit flipped, so
/// two's-complement negatives sort before positives under unsigned compare.
pub(super) fn encode_long_bits(value: i64) -> [u8; 8] {
    ((value as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Inverse of [`encode_long_bits`]; requires exactly 8 bytes.
pub(super) fn decode_long_bits(bytes: &[u8]) -> Result<i64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        Error::invalid_argument(format!("long decode requires 8 bytes, got {}", bytes.len()))
    })?;
    Ok((u64::from_be_bytes(arr) ^ SIGN_BIT) as i64)
}

/// Identity coder over raw bytes. Rejects empty input in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCoder;

impl Lexicoder for BytesCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::Bytes
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Bytes(bytes) if bytes.is_empty() => {
                Err(Error::invalid_argument("bytes coder rejects empty input"))
            }
            Value::Bytes(bytes) => Ok(bytes.clone()),
            other => Err(Error::invalid_argument(format!(
                "bytes coder cannot encode {}",
                other.type_name()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        if bytes.is_empty() {
            return Err(Error::invalid_argument("bytes coder rejects empty input"));
        }
        Ok(Value::Bytes(bytes.to_vec()))
    }
}

/// UTF-8 string coder. UTF-8 byte order matches code-point order, so the
/// identity encoding already preserves string ordering. Rejects empty strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCoder;

impl Lexicoder for StringCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::String
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Text(s) if s.is_empty() => {
                Err(Error::invalid_argument("string coder rejects empty input"))
            }
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(Error::invalid_argument(format!(
                "string coder cannot encode {}",
                other.type_name()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        if bytes.is_empty() {
            return Err(Error::invalid_argument("string coder rejects empty input"));
        }
        let s = std::str::from_utf8(bytes)
            .map_err(|e| Error::invalid_argument(format!("invalid UTF-8 in string key: {}", e)))?;
        Ok(Value::Text(s.to_string()))
    }
}

/// Signed 64-bit integer coder: 8 bytes big-endian, sign bit flipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongCoder;

impl Lexicoder for LongCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::Long
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Long(v) => Ok(encode_long_bits(*v).to_vec()),
            other => Err(Error::invalid_argument(format!(
                "long coder cannot encode {}",
                other.type_name()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        Ok(Value::Long(decode_long_bits(bytes)?))
    }
}

/// IEEE-754 double coder.
///
/// The bit pattern is remapped so unsigned byte order matches numeric order
/// for all finite values: a set sign bit means the whole word is inverted,
/// otherwise only the sign bit is flipped. `-0.0` is normalized to `+0.0`
/// before encoding. NaN is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleCoder;

impl Lexicoder for DoubleCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::Double
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let v = match value {
            Value::Double(v) => *v,
            other => {
                return Err(Error::invalid_argument(format!(
                    "double coder cannot encode {}",
                    other.type_name()
                )))
            }
        };
        if v.is_nan() {
            return Err(Error::invalid_argument("double coder rejects NaN"));
        }
        // -0.0 and +0.0 must encode identically
        let v = if v == 0.0 { 0.0 } else { v };
        let bits = v.to_bits();
        let mapped = if bits & SIGN_BIT != 0 {
            !bits
        } else {
            bits ^ SIGN_BIT
        };
        Ok(mapped.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| {
            Error::invalid_argument(format!(
                "double decode requires 8 bytes, got {}",
                bytes.len()
            ))
        })?;
        let mapped = u64::from_be_bytes(arr);
        let bits = if mapped & SIGN_BIT != 0 {
            mapped ^ SIGN_BIT
        } else {
            !mapped
        };
        Ok(Value::Double(f64::from_bits(bits)))
    }
}

/// Instant coder: milliseconds since the Unix epoch through the long coder.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantCoder;

impl Lexicoder for InstantCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::Instant
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Instant(t) => Ok(encode_long_bits(t.timestamp_millis()).to_vec()),
            other => Err(Error::invalid_argument(format!(
                "instant coder cannot encode {}",
                other.type_name()
            ))),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let millis = decode_long_bits(bytes)?;
        let instant = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| Error::invalid_argument(format!("instant out of range: {}", millis)))?;
        Ok(Value::Instant(instant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(coder: &dyn Lexicoder, value: impl Into<Value>) -> Vec<u8> {
        coder.encode(&value.into()).unwrap()
    }

    #[test]
    fn test_bytes_identity() {
        let coder = BytesCoder;
        let encoded = encode(&coder, vec![1u8, 2, 3]);
        assert_eq!(encoded, vec![1, 2, 3]);
        assert_eq!(coder.decode(&encoded).unwrap(), Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_bytes_rejects_empty() {
        assert!(BytesCoder.encode(&Value::Bytes(vec![])).is_err());
        assert!(BytesCoder.decode(&[]).is_err());
    }

    #[test]
    fn test_string_rejects_empty() {
        assert!(StringCoder.encode(&Value::Text(String::new())).is_err());
        assert!(StringCoder.decode(&[]).is_err());
    }

    #[test]
    fn test_string_order() {
        let coder = StringCoder;
        let a = encode(&coder, "apple");
        let b = encode(&coder, "banana");
        let prefix = encode(&coder, "app");
        assert!(a < b);
        assert!(prefix < a);
    }

    #[test]
    fn test_long_order_and_round_trip() {
        let coder = LongCoder;
        let values = [i64::MIN, -1_000_000, -1, 0, 1, 42, i64::MAX];
        let mut prev: Option<Vec<u8>> = None;
        for v in values {
            let encoded = encode(&coder, v);
            assert_eq!(encoded.len(), 8);
            assert_eq!(coder.decode(&encoded).unwrap(), Value::Long(v));
            if let Some(p) = prev {
                assert!(p < encoded, "encoding must ascend with value {}", v);
            }
            prev = Some(encoded);
        }
    }

    #[test]
    fn test_long_decode_requires_8_bytes() {
        assert!(LongCoder.decode(&[0; 7]).is_err());
        assert!(LongCoder.decode(&[0; 9]).is_err());
    }

    #[test]
    fn test_double_sort_order() {
        let coder = DoubleCoder;
        let values = [
            f64::NEG_INFINITY,
            f64::MIN,
            -1.5,
            -1.0,
            -f64::MIN_POSITIVE,
            0.0,
            f64::MIN_POSITIVE,
            1.0,
            1.5,
            f64::MAX,
            f64::INFINITY,
        ];
        let encoded: Vec<Vec<u8>> = values.iter().map(|&v| encode(&coder, v)).collect();
        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_double_negative_zero() {
        let coder = DoubleCoder;
        assert_eq!(encode(&coder, -0.0), encode(&coder, 0.0));
    }

    #[test]
    fn test_double_round_trip() {
        let coder = DoubleCoder;
        for v in [-123.456, -0.0, 0.0, 1e-300, 6.02e23, f64::INFINITY] {
            let decoded = coder.decode(&encode(&coder, v)).unwrap();
            // -0.0 normalizes to +0.0; everything else round-trips exactly
            let expected = if v == 0.0 { 0.0 } else { v };
            assert_eq!(decoded, Value::Double(expected));
        }
    }

    #[test]
    fn test_double_rejects_nan() {
        assert!(DoubleCoder.encode(&Value::Double(f64::NAN)).is_err());
    }

    #[test]
    fn test_instant_round_trip_and_order() {
        let coder = InstantCoder;
        let early = Utc.timestamp_millis_opt(-86_400_000).unwrap();
        let epoch = Utc.timestamp_millis_opt(0).unwrap();
        let late = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let e1 = encode(&coder, early);
        let e2 = encode(&coder, epoch);
        let e3 = encode(&coder, late);
        assert!(e1 < e2 && e2 < e3);
        assert_eq!(coder.decode(&e3).unwrap(), Value::Instant(late));
    }
}
