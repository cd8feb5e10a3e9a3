//! Vector representations the map can be trained on.
//!
//! A [`VectorStrategy`] bundles everything the training loop needs to know
//! about one kind of vector:
//!
//! - **Binary** fingerprints (packed key bits, Tanimoto-style dissimilarity)
//! - **Real** descriptor vectors (standardized, normalized Euclidean distance)
//!
//! The trainer is generic over the strategy, so the hot dissimilarity and
//! update loops are statically dispatched.

mod binary;
mod real;

pub use binary::{BinaryStrategy, BitVector};
pub use real::RealStrategy;

use crate::error::{Result, SomError};
use crate::storage::{TagReader, TagWriter};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::io::{BufRead, Write};

/// Number of vectors an [`InputSource`] can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCount {
    /// A finite, indexable set of vectors.
    Finite(usize),
    /// Vectors are generated on demand; there is no fixed set to index.
    Unbounded,
}

/// Supplies training vectors by row.
///
/// `vector_at` must return an independent copy: the trainer normalizes the
/// returned vector in place.
pub trait InputSource<V> {
    /// Number of available vectors.
    fn count(&self) -> InputCount;

    /// Returns an owned copy of the vector at `row`.
    fn vector_at(&self, row: usize) -> V;
}

impl<V: Clone> InputSource<V> for [V] {
    fn count(&self) -> InputCount {
        InputCount::Finite(self.len())
    }

    fn vector_at(&self, row: usize) -> V {
        self[row].clone()
    }
}

impl<V: Clone> InputSource<V> for Vec<V> {
    fn count(&self) -> InputCount {
        InputCount::Finite(self.len())
    }

    fn vector_at(&self, row: usize) -> V {
        self[row].clone()
    }
}

/// An unbounded source backed by a generator closure.
///
/// The closure receives the running training cycle as its row.
pub struct GeneratedSource<F> {
    generator: F,
}

impl<F> GeneratedSource<F> {
    /// Wraps a generator closure.
    pub fn new(generator: F) -> Self {
        Self { generator }
    }
}

impl<V, F: Fn(usize) -> V> InputSource<V> for GeneratedSource<F> {
    fn count(&self) -> InputCount {
        InputCount::Unbounded
    }

    fn vector_at(&self, row: usize) -> V {
        (self.generator)(row)
    }
}

/// Capability set for one kind of training vector.
pub trait VectorStrategy: Sync + Serialize + DeserializeOwned {
    /// Concrete vector representation.
    type Vector: Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned;

    /// Number of keys or parameters per vector.
    fn dimension(&self) -> usize;

    /// Dimensionality of a concrete vector.
    fn vector_dimension(&self, vector: &Self::Vector) -> usize;

    /// Dissimilarity in `[0, 1]`; identical vectors yield 0.
    fn dissimilarity(&self, a: &Self::Vector, b: &Self::Vector) -> f64;

    /// Called by the trainer once per training step before any update.
    fn begin_cycle<R: Rng + ?Sized>(&mut self, _rng: &mut R) {}

    /// Pulls `reference` towards `input` by `influence`.
    fn update_reference(&self, reference: &mut Self::Vector, input: &Self::Vector, influence: f64);

    /// Draws a random vector resembling the input distribution.
    fn random_vector<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Vector;

    /// Blends two vectors, used to interpolate new cells when growing.
    fn mean_vector<R: Rng + ?Sized>(
        &self,
        a: &Self::Vector,
        b: &Self::Vector,
        rng: &mut R,
    ) -> Self::Vector;

    /// Gathers the global statistics needed by `normalize` and
    /// `random_vector` from a finite source of `count` vectors.
    fn collect_statistics<S: InputSource<Self::Vector> + ?Sized>(
        &mut self,
        source: &S,
        count: usize,
    ) -> Result<()>;

    /// Normalizes an input vector in place.
    fn normalize(&self, vector: &mut Self::Vector);

    /// Writes the strategy's statistics tags.
    fn write_statistics<W: Write>(&self, writer: &mut TagWriter<W>) -> Result<()>;

    /// Reads a strategy back from the tags written by `write_statistics`.
    fn read_statistics<R: BufRead>(reader: &mut TagReader<R>) -> Result<Self>
    where
        Self: Sized;

    /// Encodes a reference vector as a tag value.
    fn serialize_vector(&self, vector: &Self::Vector) -> String;

    /// Decodes a tag value produced by `serialize_vector`.
    fn deserialize_vector(&self, text: &str) -> Result<Self::Vector>;

    /// Fails unless `vector` matches the strategy's dimensionality.
    fn check_dimension(&self, vector: &Self::Vector) -> Result<()> {
        let found = self.vector_dimension(vector);
        if found != self.dimension() {
            return Err(SomError::DimensionMismatch {
                expected: self.dimension(),
                found,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source() {
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(data.count(), InputCount::Finite(2));

        let mut copy = data.vector_at(1);
        copy[0] = 99.0;
        assert_eq!(data[1][0], 3.0);
    }

    #[test]
    fn test_generated_source() {
        let source = GeneratedSource::new(|row: usize| vec![row as f64]);
        assert_eq!(source.count(), InputCount::Unbounded);
        assert_eq!(source.vector_at(7), vec![7.0]);
    }
}
