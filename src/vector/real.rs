//! Standardized real-valued descriptor vectors.

use crate::error::{Result, SomError};
use crate::storage::{format_list, parse_list, TagReader, TagWriter};
use crate::vector::{InputSource, VectorStrategy};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

/// Squared Euclidean distance, unrolled by 8 for autovectorization.
#[inline]
pub(crate) fn distance_squared(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());

    let chunks = a.len() / 8;
    let mut sum = 0.0;

    for i in 0..chunks {
        let base = i * 8;
        let d0 = a[base] - b[base];
        let d1 = a[base + 1] - b[base + 1];
        let d2 = a[base + 2] - b[base + 2];
        let d3 = a[base + 3] - b[base + 3];
        let d4 = a[base + 4] - b[base + 4];
        let d5 = a[base + 5] - b[base + 5];
        let d6 = a[base + 6] - b[base + 6];
        let d7 = a[base + 7] - b[base + 7];

        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3 + d4 * d4 + d5 * d5 + d6 * d6 + d7 * d7;
    }

    for i in chunks * 8..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }

    sum
}

/// Strategy for real-valued vectors.
///
/// Inputs are standardized per dimension with statistics gathered before
/// training, so reference vectors are initialized from a standard normal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealStrategy {
    parameter_count: usize,
    mean: Vec<f64>,
    stddev: Vec<f64>,
}

impl RealStrategy {
    /// Creates a strategy for `parameter_count` dimensions with identity
    /// normalization.
    pub fn new(parameter_count: usize) -> Self {
        Self {
            parameter_count,
            mean: vec![0.0; parameter_count],
            stddev: vec![1.0; parameter_count],
        }
    }

    /// Per-dimension means.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Per-dimension standard deviations.
    pub fn stddev(&self) -> &[f64] {
        &self.stddev
    }
}

impl VectorStrategy for RealStrategy {
    type Vector = Vec<f64>;

    fn dimension(&self) -> usize {
        self.parameter_count
    }

    fn vector_dimension(&self, vector: &Vec<f64>) -> usize {
        vector.len()
    }

    fn dissimilarity(&self, a: &Vec<f64>, b: &Vec<f64>) -> f64 {
        if a.is_empty() {
            return 0.0;
        }
        (distance_squared(a, b) / a.len() as f64).sqrt()
    }

    fn update_reference(&self, reference: &mut Vec<f64>, input: &Vec<f64>, influence: f64) {
        for (r, i) in reference.iter_mut().zip(input.iter()) {
            *r += influence * (i - *r);
        }
    }

    fn random_vector<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        (0..self.parameter_count)
            .map(|_| rng.sample::<f64, _>(StandardNormal))
            .collect()
    }

    fn mean_vector<R: Rng + ?Sized>(&self, a: &Vec<f64>, b: &Vec<f64>, _rng: &mut R) -> Vec<f64> {
        a.iter().zip(b.iter()).map(|(x, y)| (x + y) / 2.0).collect()
    }

    fn collect_statistics<S: InputSource<Vec<f64>> + ?Sized>(
        &mut self,
        source: &S,
        count: usize,
    ) -> Result<()> {
        if count == 0 {
            return Err(SomError::EmptyInput("No vectors to standardize".to_string()));
        }

        let n = self.parameter_count;
        let mut sum = vec![0.0; n];
        for row in 0..count {
            let vector = source.vector_at(row);
            self.check_dimension(&vector)?;
            for (s, v) in sum.iter_mut().zip(&vector) {
                *s += v;
            }
        }
        let mean: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();

        let mut squares = vec![0.0; n];
        for row in 0..count {
            let vector = source.vector_at(row);
            for ((sq, v), m) in squares.iter_mut().zip(&vector).zip(&mean) {
                *sq += (v - m) * (v - m);
            }
        }
        // Constant dimensions keep their scale.
        let stddev = squares
            .iter()
            .map(|sq| {
                let sd = (sq / count as f64).sqrt();
                if sd > 0.0 {
                    sd
                } else {
                    1.0
                }
            })
            .collect();

        self.mean = mean;
        self.stddev = stddev;
        Ok(())
    }

    fn normalize(&self, vector: &mut Vec<f64>) {
        for ((v, m), s) in vector.iter_mut().zip(&self.mean).zip(&self.stddev) {
            *v = (*v - m) / s;
        }
    }

    fn write_statistics<W: Write>(&self, writer: &mut TagWriter<W>) -> Result<()> {
        writer.write_tag("parameterCount", self.parameter_count)?;
        writer.write_tag("mean", format_list(&self.mean))?;
        writer.write_tag("stddev", format_list(&self.stddev))
    }

    fn read_statistics<R: BufRead>(reader: &mut TagReader<R>) -> Result<Self> {
        let parameter_count: usize = reader.read_parsed("parameterCount")?;
        let mean = parse_list(&reader.read_tag("mean")?)?;
        let stddev = parse_list(&reader.read_tag("stddev")?)?;
        if mean.len() != parameter_count || stddev.len() != parameter_count {
            return Err(SomError::format(format!(
                "statistics length mismatch: {} means, {} deviations, {} parameters",
                mean.len(),
                stddev.len(),
                parameter_count
            )));
        }

        Ok(Self {
            parameter_count,
            mean,
            stddev,
        })
    }

    fn serialize_vector(&self, vector: &Vec<f64>) -> String {
        format_list(vector)
    }

    fn deserialize_vector(&self, text: &str) -> Result<Vec<f64>> {
        let vector = parse_list(text)?;
        if vector.len() != self.parameter_count {
            return Err(SomError::format(format!(
                "reference vector has {} values, expected {}",
                vector.len(),
                self.parameter_count
            )));
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_distance_squared_matches_naive() {
        let a: Vec<f64> = (0..19).map(|i| i as f64 * 0.5).collect();
        let b: Vec<f64> = (0..19).map(|i| (19 - i) as f64).collect();
        let naive: f64 = a.iter().zip(&b).map(|(x, y)| (x - y) * (x - y)).sum();
        assert!((distance_squared(&a, &b) - naive).abs() < 1e-9);
    }

    #[test]
    fn test_dissimilarity_is_normalized() {
        let strategy = RealStrategy::new(4);
        let a = vec![0.0; 4];
        let b = vec![1.0; 4];
        assert!((strategy.dissimilarity(&a, &b) - 1.0).abs() < 1e-12);
        assert_eq!(strategy.dissimilarity(&a, &a), 0.0);
    }

    #[test]
    fn test_update_blends() {
        let strategy = RealStrategy::new(3);
        let mut reference = vec![0.0, 0.0, 0.0];
        strategy.update_reference(&mut reference, &vec![1.0, 2.0, -2.0], 0.5);
        assert_eq!(reference, vec![0.5, 1.0, -1.0]);
    }

    #[test]
    fn test_standardization() {
        let data = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let mut strategy = RealStrategy::new(2);
        strategy.collect_statistics(&data, 2).unwrap();

        assert_eq!(strategy.mean(), &[2.0, 5.0]);
        assert_eq!(strategy.stddev(), &[1.0, 1.0]);

        let mut v = vec![3.0, 5.0];
        strategy.normalize(&mut v);
        assert_eq!(v, vec![1.0, 0.0]);
    }

    #[test]
    fn test_rejects_wrong_dimension() {
        let data = vec![vec![1.0, 2.0, 3.0]];
        let mut strategy = RealStrategy::new(2);
        assert!(matches!(
            strategy.collect_statistics(&data, 1),
            Err(SomError::DimensionMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_random_and_mean() {
        let strategy = RealStrategy::new(16);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let a = strategy.random_vector(&mut rng);
        let b = strategy.random_vector(&mut rng);
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);

        let mean = strategy.mean_vector(&a, &b, &mut rng);
        assert!((mean[3] - (a[3] + b[3]) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_text_roundtrip_is_exact() {
        let strategy = RealStrategy::new(3);
        let v = vec![0.1, -1.0e-300, 123456.789];
        let text = strategy.serialize_vector(&v);
        assert_eq!(strategy.deserialize_vector(&text).unwrap(), v);
    }
}
