//! Per-partition membership filter
//!
//! A fixed-size Bloom filter sized from an expected element count and a
//! target false-positive rate. `contains` returning false means definitely
//! absent; true means probably present. Used only as a fast negative check
//! in point lookups, never as an authoritative answer.
//!
//! Hashing is double hashing over two xxh64 seeds: bit index i is
//! `h1 + i * h2 (mod m)`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

const LN2: f64 = std::f64::consts::LN_2;

/// Default target false-positive rate.
pub const DEFAULT_FP_RATE: f64 = 0.01;

/// Fixed-size Bloom filter over byte strings.
///
/// Serializes as its parameters plus the packed bit words, so stored filters
/// are deterministic for identical insert sets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloomFilter {
    /// Number of bits
    m: u64,
    /// Number of hash functions
    k: u32,
    /// Packed bit array, 64 bits per word
    bits: Vec<u64>,
}

impl BloomFilter {
    /// Create a filter sized for `expected` elements at [`DEFAULT_FP_RATE`].
    pub fn with_capacity(expected: usize) -> Self {
        Self::with_rate(expected, DEFAULT_FP_RATE)
    }

    /// Create a filter sized for `expected` elements at the given
    /// false-positive rate.
    pub fn with_rate(expected: usize, fp_rate: f64) -> Self {
        let n = expected.max(1) as f64;
        let p = fp_rate.clamp(1e-10, 0.5);
        let m = ((-n * p.ln()) / (LN2 * LN2)).ceil().max(64.0) as u64;
        let k = ((m as f64 / n) * LN2).round().max(1.0) as u32;
        let words = m.div_ceil(64) as usize;
        Self {
            m,
            k,
            bits: vec![0; words],
        }
    }

    /// Number of bits.
    pub fn bit_count(&self) -> u64 {
        self.m
    }

    /// Number of hash functions.
    pub fn hash_count(&self) -> u32 {
        self.k
    }

    fn bit_indexes(&self, element: &[u8]) -> impl Iterator<Item = u64> + '_ {
        let h1 = xxh64(element, 0);
        // Forcing h2 odd keeps the probe sequence non-degenerate
        let h2 = xxh64(element, 1) | 1;
        let m = self.m;
        (0..self.k as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % m)
    }

    /// Insert an element.
    pub fn insert(&mut self, element: &[u8]) {
        let indexes: Vec<u64> = self.bit_indexes(element).collect();
        for idx in indexes {
            self.bits[(idx / 64) as usize] |= 1 << (idx % 64);
        }
    }

    /// Membership test: false means definitely absent.
    pub fn contains(&self, element: &[u8]) -> bool {
        self.bit_indexes(element)
            .all(|idx| self.bits[(idx / 64) as usize] & (1 << (idx % 64)) != 0)
    }

    /// Bitwise-OR merge with another filter of identical parameters.
    pub fn merge(&mut self, other: &BloomFilter) -> Result<()> {
        if self.m != other.m || self.k != other.k {
            return Err(Error::invalid_argument(format!(
                "cannot merge bloom filters with different parameters: ({}, {}) vs ({}, {})",
                self.m, self.k, other.m, other.k
            )));
        }
        for (word, other_word) in self.bits.iter_mut().zip(&other.bits) {
            *word |= other_word;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_inserted_elements_are_present() {
        let mut filter = BloomFilter::with_capacity(100);
        for i in 0..100u32 {
            filter.insert(&i.to_be_bytes());
        }
        for i in 0..100u32 {
            assert!(filter.contains(&i.to_be_bytes()));
        }
    }

    #[test]
    fn test_false_positive_rate_is_plausible() {
        let mut filter = BloomFilter::with_rate(1000, 0.01);
        let mut rng = StdRng::seed_from_u64(7);
        let members: Vec<[u8; 8]> = (0..1000).map(|_| rng.gen()).collect();
        for m in &members {
            filter.insert(m);
        }

        let mut false_positives = 0;
        let probes = 10_000;
        for _ in 0..probes {
            let probe: [u8; 16] = rng.gen();
            if filter.contains(&probe) {
                false_positives += 1;
            }
        }
        // 1% target; allow generous slack for hash variance
        assert!(
            false_positives < probes / 20,
            "false positive count {} too high",
            false_positives
        );
    }

    #[test]
    fn test_merge_unions_membership() {
        let mut a = BloomFilter::with_capacity(50);
        let mut b = BloomFilter::with_capacity(50);
        a.insert(b"left");
        b.insert(b"right");

        a.merge(&b).unwrap();
        assert!(a.contains(b"left"));
        assert!(a.contains(b"right"));
    }

    #[test]
    fn test_merge_rejects_mismatched_parameters() {
        let mut a = BloomFilter::with_capacity(50);
        let b = BloomFilter::with_capacity(5000);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut filter = BloomFilter::with_capacity(10);
        filter.insert(b"key");
        let json = serde_json::to_string(&filter).unwrap();
        let back: BloomFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filter);
        assert!(back.contains(b"key"));
    }
}
