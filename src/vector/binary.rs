//! Packed-bit fingerprint vectors.

use crate::error::{Result, SomError};
use crate::storage::{format_list, parse_list, TagReader, TagWriter};
use crate::vector::{InputSource, VectorStrategy};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

const WORD_BITS: usize = 32;

/// Bit counts for every 16-bit value; a 32-bit word takes two lookups.
static POPCOUNT16: Lazy<Vec<u8>> = Lazy::new(|| {
    let mut table = vec![0u8; 1 << 16];
    for i in 1..table.len() {
        table[i] = table[i >> 1] + (i & 1) as u8;
    }
    table
});

#[inline]
fn popcount(table: &[u8], word: u32) -> u32 {
    table[(word & 0xFFFF) as usize] as u32 + table[(word >> 16) as usize] as u32
}

/// A fingerprint of `key_count` bits packed into 32-bit words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVector {
    words: Vec<u32>,
}

impl BitVector {
    /// Creates an all-zero fingerprint for `key_count` keys.
    pub fn new(key_count: usize) -> Self {
        Self {
            words: vec![0; key_count.div_ceil(WORD_BITS)],
        }
    }

    /// Creates a fingerprint with the given keys set.
    pub fn from_keys(keys: &[usize], key_count: usize) -> Self {
        let mut vector = Self::new(key_count);
        for &key in keys {
            vector.set(key, true);
        }
        vector
    }

    /// Wraps already packed words.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self { words }
    }

    /// Returns the packed words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Checks whether a key is set.
    #[inline]
    pub fn get(&self, key: usize) -> bool {
        self.words[key / WORD_BITS] & (1 << (key % WORD_BITS)) != 0
    }

    /// Sets or clears a key.
    #[inline]
    pub fn set(&mut self, key: usize, value: bool) {
        let mask = 1u32 << (key % WORD_BITS);
        if value {
            self.words[key / WORD_BITS] |= mask;
        } else {
            self.words[key / WORD_BITS] &= !mask;
        }
    }

    /// Number of set keys.
    pub fn count_ones(&self) -> u32 {
        let table = &*POPCOUNT16;
        self.words.iter().map(|&w| popcount(table, w)).sum()
    }
}

/// Strategy for binary fingerprints.
///
/// Dissimilarity is `1 - shared/union` (the Tanimoto distance). Updates copy
/// a number of input bits proportional to the influence, chosen by a key
/// permutation that is reshuffled every cycle; within one cycle a larger
/// update always covers the keys of a smaller one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryStrategy {
    key_count: usize,
    /// Fraction of input vectors having each key set.
    key_frequency: Vec<f64>,
    /// Current cycle's key permutation.
    key_order: Vec<usize>,
}

impl BinaryStrategy {
    /// Creates a strategy for fingerprints of `key_count` keys.
    ///
    /// Until statistics are collected every key has frequency 0.5.
    pub fn new(key_count: usize) -> Self {
        Self {
            key_count,
            key_frequency: vec![0.5; key_count],
            key_order: (0..key_count).collect(),
        }
    }

    /// Per-key frequencies used by `random_vector`.
    pub fn key_frequency(&self) -> &[f64] {
        &self.key_frequency
    }

    /// Number of bits copied from the input for a given influence.
    #[inline]
    pub fn bits_for_influence(&self, influence: f64) -> usize {
        ((influence * self.key_count as f64).round().max(0.0) as usize).min(self.key_count)
    }
}

impl VectorStrategy for BinaryStrategy {
    type Vector = BitVector;

    fn dimension(&self) -> usize {
        self.key_count
    }

    fn vector_dimension(&self, vector: &BitVector) -> usize {
        // Packed words only reveal the capacity; anything fitting matches.
        if vector.words.len() == self.key_count.div_ceil(WORD_BITS) {
            self.key_count
        } else {
            vector.words.len() * WORD_BITS
        }
    }

    fn dissimilarity(&self, a: &BitVector, b: &BitVector) -> f64 {
        let table = &*POPCOUNT16;
        let mut shared = 0u32;
        let mut union = 0u32;
        for (&x, &y) in a.words.iter().zip(&b.words) {
            shared += popcount(table, x & y);
            union += popcount(table, x | y);
        }

        if union == 0 {
            0.0
        } else {
            1.0 - shared as f64 / union as f64
        }
    }

    fn begin_cycle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.key_order.shuffle(rng);
    }

    fn update_reference(&self, reference: &mut BitVector, input: &BitVector, influence: f64) {
        let bits = self.bits_for_influence(influence);
        for &key in &self.key_order[..bits] {
            reference.set(key, input.get(key));
        }
    }

    fn random_vector<R: Rng + ?Sized>(&self, rng: &mut R) -> BitVector {
        let mut vector = BitVector::new(self.key_count);
        for (key, &frequency) in self.key_frequency.iter().enumerate() {
            if rng.gen_bool(frequency.clamp(0.0, 1.0)) {
                vector.set(key, true);
            }
        }
        vector
    }

    fn mean_vector<R: Rng + ?Sized>(&self, a: &BitVector, b: &BitVector, rng: &mut R) -> BitVector {
        // Equal bits survive either way; differing bits are a coin flip.
        let words = a
            .words
            .iter()
            .zip(&b.words)
            .map(|(&x, &y)| {
                let pick: u32 = rng.gen();
                (x & pick) | (y & !pick)
            })
            .collect();
        BitVector { words }
    }

    fn collect_statistics<S: InputSource<BitVector> + ?Sized>(
        &mut self,
        source: &S,
        count: usize,
    ) -> Result<()> {
        if count == 0 {
            return Err(SomError::EmptyInput("No vectors to collect key frequencies from".to_string()));
        }

        let mut hits = vec![0usize; self.key_count];
        for row in 0..count {
            let vector = source.vector_at(row);
            self.check_dimension(&vector)?;
            for (word_index, &word) in vector.words.iter().enumerate() {
                let mut remaining = word;
                while remaining != 0 {
                    let bit = remaining.trailing_zeros() as usize;
                    let key = word_index * WORD_BITS + bit;
                    if key < self.key_count {
                        hits[key] += 1;
                    }
                    remaining &= remaining - 1;
                }
            }
        }

        self.key_frequency = hits.iter().map(|&h| h as f64 / count as f64).collect();
        Ok(())
    }

    fn normalize(&self, _vector: &mut BitVector) {}

    fn write_statistics<W: Write>(&self, writer: &mut TagWriter<W>) -> Result<()> {
        writer.write_tag("keyCount", self.key_count)?;
        writer.write_tag("keyFrequency", format_list(&self.key_frequency))
    }

    fn read_statistics<R: BufRead>(reader: &mut TagReader<R>) -> Result<Self> {
        let key_count: usize = reader.read_parsed("keyCount")?;
        let key_frequency = parse_list(&reader.read_tag("keyFrequency")?)?;
        if key_frequency.len() != key_count {
            return Err(SomError::format(format!(
                "keyFrequency has {} entries, expected {}",
                key_frequency.len(),
                key_count
            )));
        }

        Ok(Self {
            key_count,
            key_frequency,
            key_order: (0..key_count).collect(),
        })
    }

    fn serialize_vector(&self, vector: &BitVector) -> String {
        vector.words.iter().map(|w| format!("{w:08x}")).collect()
    }

    fn deserialize_vector(&self, text: &str) -> Result<BitVector> {
        let expected = self.key_count.div_ceil(WORD_BITS);
        if text.len() != expected * 8 {
            return Err(SomError::format(format!(
                "binary vector needs {} hex digits, found {}",
                expected * 8,
                text.len()
            )));
        }
        if let Some(bad) = text.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(SomError::format(format!("bad hex digit {bad:?} in binary vector")));
        }

        let words = (0..expected)
            .map(|i| {
                u32::from_str_radix(&text[i * 8..i * 8 + 8], 16)
                    .map_err(|e| SomError::format(format!("bad hex word: {e}")))
            })
            .collect::<Result<Vec<u32>>>()?;

        let used = self.key_count % WORD_BITS;
        if let Some(&last) = words.last() {
            if used != 0 && last >> used != 0 {
                return Err(SomError::format(format!(
                    "binary vector sets keys beyond key count {}",
                    self.key_count
                )));
            }
        }
        Ok(BitVector { words })
    }
}
