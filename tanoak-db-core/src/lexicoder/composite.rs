//! Composite lexicoders: sequence, tuple, reverse
//!
//! Sequence and tuple concatenate element encodings with a single 0x00
//! separator between elements. Within an element, 0x00 is rewritten as
//! 0x01 0x01 and 0x01 as 0x01 0x02, so the unescaped separator is
//! unambiguous and sorts strictly before any escaped content. This keeps
//! element-wise order intact across concatenation.

use super::{CoderConfig, Lexicoder};
use crate::error::{Error, Result};
use crate::value::Value;

const SEPARATOR: u8 = 0x00;
const ESCAPE: u8 = 0x01;

/// Escape element bytes: 0x00 -> 0x01 0x01, 0x01 -> 0x01 0x02.
pub fn escape_bytes(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    for &b in input {
        match b {
            SEPARATOR => out.extend_from_slice(&[ESCAPE, 0x01]),
            ESCAPE => out.extend_from_slice(&[ESCAPE, 0x02]),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_bytes`]. Rejects stray separators and malformed
/// escape pairs.
pub fn unescape_bytes(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.iter();
    while let Some(&b) = iter.next() {
        match b {
            SEPARATOR => {
                return Err(Error::invalid_argument(
                    "unescaped separator inside element bytes",
                ))
            }
            ESCAPE => match iter.next() {
                Some(0x01) => out.push(SEPARATOR),
                Some(0x02) => out.push(ESCAPE),
                other => {
                    return Err(Error::invalid_argument(format!(
                        "malformed escape pair 0x01 {:02x?}",
                        other
                    )))
                }
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Split composite bytes on unescaped separators.
///
/// Empty input yields zero elements (the empty sequence).
fn split_elements(bytes: &[u8]) -> Vec<&[u8]> {
    if bytes.is_empty() {
        return Vec::new();
    }
    bytes.split(|&b| b == SEPARATOR).collect()
}

fn encode_elements(coders: &[&dyn Lexicoder], items: &[Value]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for (i, (coder, item)) in coders.iter().zip(items).enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        let encoded = coder.encode(item)?;
        out.extend_from_slice(&escape_bytes(&encoded));
    }
    Ok(out)
}

/// Variable-length list coder over one element type.
///
/// The empty list encodes to empty output, which outer contexts requiring
/// non-empty keys reject.
#[derive(Debug)]
pub struct SequenceCoder {
    elem: Box<dyn Lexicoder>,
}

impl SequenceCoder {
    /// Create a sequence coder over the given element coder.
    pub fn new(elem: Box<dyn Lexicoder>) -> Self {
        Self { elem }
    }
}

impl Lexicoder for SequenceCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::Sequence(Box::new(self.elem.config()))
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let items = match value {
            Value::List(items) => items,
            other => {
                return Err(Error::invalid_argument(format!(
                    "sequence coder cannot encode {}",
                    other.type_name()
                )))
            }
        };
        let coders: Vec<&dyn Lexicoder> = items.iter().map(|_| self.elem.as_ref()).collect();
        encode_elements(&coders, items)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let mut items = Vec::new();
        for segment in split_elements(bytes) {
            let raw = unescape_bytes(segment)?;
            items.push(self.elem.decode(&raw)?);
        }
        Ok(Value::List(items))
    }
}

/// Fixed-arity composite coder.
///
/// Encode rejects wrong-arity inputs; decode rejects element-count
/// mismatches.
#[derive(Debug)]
pub struct TupleCoder {
    elems: Vec<Box<dyn Lexicoder>>,
}

impl TupleCoder {
    /// Create a tuple coder over the given element coders.
    pub fn new(elems: Vec<Box<dyn Lexicoder>>) -> Self {
        Self { elems }
    }

    /// Declared arity.
    pub fn arity(&self) -> usize {
        self.elems.len()
    }
}

impl Lexicoder for TupleCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::Tuple(self.elems.iter().map(|e| e.config()).collect())
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let items = match value {
            Value::List(items) => items,
            other => {
                return Err(Error::invalid_argument(format!(
                    "tuple coder cannot encode {}",
                    other.type_name()
                )))
            }
        };
        if items.len() != self.elems.len() {
            return Err(Error::invalid_argument(format!(
                "tuple coder expects {} elements, got {}",
                self.elems.len(),
                items.len()
            )));
        }
        let coders: Vec<&dyn Lexicoder> = self.elems.iter().map(|e| e.as_ref()).collect();
        encode_elements(&coders, items)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let segments = split_elements(bytes);
        if segments.len() != self.elems.len() {
            return Err(Error::invalid_argument(format!(
                "tuple coder expects {} elements, found {}",
                self.elems.len(),
                segments.len()
            )));
        }
        let mut items = Vec::with_capacity(segments.len());
        for (coder, segment) in self.elems.iter().zip(segments) {
            let raw = unescape_bytes(segment)?;
            items.push(coder.decode(&raw)?);
        }
        Ok(Value::List(items))
    }
}

/// Order-reversing wrapper: encodes with the inner coder, then maps each
/// byte b to 255 - b.
#[derive(Debug)]
pub struct ReverseCoder {
    inner: Box<dyn Lexicoder>,
}

impl ReverseCoder {
    /// Create a reverse coder around the given inner coder.
    pub fn new(inner: Box<dyn Lexicoder>) -> Self {
        Self { inner }
    }
}

impl Lexicoder for ReverseCoder {
    fn config(&self) -> CoderConfig {
        CoderConfig::Reverse(Box::new(self.inner.config()))
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut encoded = self.inner.encode(value)?;
        for b in &mut encoded {
            *b = 255 - *b;
        }
        Ok(encoded)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let restored: Vec<u8> = bytes.iter().map(|&b| 255 - b).collect();
        self.inner.decode(&restored)
    }
}
