//! Trained Self-Organizing Map.

use crate::config::{CreationMode, SomConfig};
use crate::error::Result;
use crate::som::search::{exhaustive_search, QuickSearch};
use crate::som::Grid;
use crate::storage::{load_snapshot, save_snapshot, SomFormat};
use crate::vector::VectorStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A grid of reference vectors together with the strategy that built it.
///
/// The strategy carries the normalization statistics, so query vectors
/// are normalized exactly like the training inputs were.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "S: VectorStrategy", deserialize = "S: VectorStrategy"))]
pub struct SelfOrganizingMap<S: VectorStrategy> {
    mode: CreationMode,
    strategy: S,
    grid: Grid<S::Vector>,
}

impl<S: VectorStrategy> SelfOrganizingMap<S> {
    /// Assembles a map from its parts.
    pub fn new(mode: CreationMode, strategy: S, grid: Grid<S::Vector>) -> Self {
        Self { mode, strategy, grid }
    }

    /// Creation flags.
    pub fn mode(&self) -> CreationMode {
        self.mode
    }

    /// Vector strategy, including normalization statistics.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Reference vectors.
    pub fn grid(&self) -> &Grid<S::Vector> {
        &self.grid
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.grid.width()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.grid.height()
    }

    /// Configuration for training a fresh map with the same settings.
    pub fn config(&self) -> SomConfig {
        SomConfig::from_creation_mode(self.mode, self.grid.width(), self.grid.height())
    }

    /// Splits the map into its parts.
    pub fn into_parts(self) -> (CreationMode, S, Grid<S::Vector>) {
        (self.mode, self.strategy, self.grid)
    }

    /// Checks the grid shape and every reference vector's dimensionality.
    pub fn validate(&self) -> Result<()> {
        self.grid.check_shape()?;
        for vector in self.grid.cells() {
            self.strategy.check_dimension(vector)?;
        }
        Ok(())
    }

    /// Position of the reference vector most similar to `vector`.
    pub fn best_match_location(&self, vector: &S::Vector) -> Result<(usize, usize)> {
        let input = self.prepare(vector)?;
        let (index, _) = exhaustive_search(self.grid.cells(), |r| self.strategy.dissimilarity(r, &input))
            .unwrap_or((0, 0.0));
        Ok(self.grid.position_of(index))
    }

    /// Position reached by hill-climbing from `start`.
    pub fn quick_best_match_location(&self, vector: &S::Vector, start: (usize, usize)) -> Result<(usize, usize)> {
        let input = self.prepare(vector)?;
        let mut quick = QuickSearch::new();
        let (position, _) = quick.search(&self.grid, start, |r| self.strategy.dissimilarity(r, &input));
        Ok(position)
    }

    /// Dissimilarity between `vector` and the reference vector at `(x, y)`.
    pub fn dissimilarity_at(&self, vector: &S::Vector, x: usize, y: usize) -> Result<f64> {
        let input = self.prepare(vector)?;
        Ok(self.strategy.dissimilarity(self.grid.reference(x, y), &input))
    }

    /// Writes the map in the line-oriented text format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        SomFormat::write(path, self)
    }

    /// Reads a map written by [`SelfOrganizingMap::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        SomFormat::read(path)
    }

    /// Writes a compact binary snapshot.
    pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_snapshot(path, self)
    }

    /// Reads a snapshot written by [`SelfOrganizingMap::save_snapshot`].
    pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_snapshot(path)
    }

    fn prepare(&self, vector: &S::Vector) -> Result<S::Vector> {
        self.strategy.check_dimension(vector)?;
        let mut input = vector.clone();
        self.strategy.normalize(&mut input);
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Neighborhood, Topology};
    use crate::vector::RealStrategy;

    fn ramp_map() -> SelfOrganizingMap<RealStrategy> {
        let mode = CreationMode {
            neighborhood: Neighborhood::Gaussian,
            topology: Topology::Bounded,
            grow: false,
            fast_best_match: false,
        };
        let grid = Grid::from_fn(4, 3, Topology::Bounded, |x, y| vec![x as f64, y as f64]);
        SelfOrganizingMap::new(mode, RealStrategy::new(2), grid)
    }

    #[test]
    fn test_best_match_location() {
        let map = ramp_map();
        assert_eq!(map.best_match_location(&vec![2.9, 0.2]).unwrap(), (3, 0));
        assert_eq!(map.best_match_location(&vec![1.1, 1.8]).unwrap(), (1, 2));
    }

    #[test]
    fn test_quick_agrees_on_smooth_map() {
        let map = ramp_map();
        for v in [vec![0.0, 0.0], vec![3.0, 2.0], vec![1.4, 0.6]] {
            assert_eq!(
                map.quick_best_match_location(&v, (0, 2)).unwrap(),
                map.best_match_location(&v).unwrap()
            );
        }
    }

    #[test]
    fn test_wrong_dimension() {
        let map = ramp_map();
        assert!(map.best_match_location(&vec![1.0]).is_err());
    }

    #[test]
    fn test_validate() {
        let map = ramp_map();
        assert!(map.validate().is_ok());
        assert_eq!(map.dissimilarity_at(&vec![3.0, 0.0], 3, 0).unwrap(), 0.0);
    }

    #[test]
    fn test_config_from_mode() {
        let config = ramp_map().config();
        assert_eq!((config.width, config.height), (4, 3));
        assert_eq!(config.topology, Topology::Bounded);
        assert_eq!(config.grow_steps, 0);
        assert!(config.validate().is_ok());
    }
}
