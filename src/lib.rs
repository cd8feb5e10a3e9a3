//! # Cartograph - Self-Organizing Map Engine
//!
//! Cartograph trains Kohonen Self-Organizing Maps (SOMs): a 2D grid of
//! reference vectors that, after training, places similar inputs on nearby
//! grid cells.
//!
//! ## Key Features
//!
//! - **Generic vectors**: binary fingerprints (Tanimoto dissimilarity) and
//!   real-valued descriptors (standardized Euclidean distance)
//! - **Bounded or toroidal grids** with Gaussian, Mexican hat or linear
//!   neighbourhoods
//! - **Growing maps** that double in size between training phases
//! - **Parallel training** with results independent of the thread count
//! - **Fast best-match search** that switches to a local hill climb once it
//!   has proven reliable
//! - **Persistence** as a line-oriented text format or bincode snapshots
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cartograph::{NeverCancel, NoProgress, RealStrategy, SomConfig, SomTrainer};
//!
//! let data = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
//!
//! let config = SomConfig { width: 8, height: 8, seed: Some(7), ..Default::default() };
//! let mut trainer = SomTrainer::new(config, RealStrategy::new(2))?;
//! trainer.train(&data, &mut NoProgress, &NeverCancel)?;
//!
//! let map = trainer.into_map()?;
//! let (x, y) = map.best_match_location(&vec![0.9, 0.1])?;
//! map.save("corners.som")?;
//! ```
//!
//! ## Architecture
//!
//! - [`vector`] - Vector strategies and input sources
//! - [`som`] - Grid, influence schedule, search and the training loop
//! - [`storage`] - Text format and binary snapshots
//! - [`config`] - Training configuration and creation flags

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod som;
pub mod storage;
pub mod vector;

// Re-export commonly used types
pub use config::{CreationMode, Neighborhood, SomConfig, Topology, DEFAULT_CYCLES_PER_NODE};
pub use error::{Result, SomError};
pub use som::{
    CancellationToken, FastMatch, Grid, LogProgress, NeverCancel, NoProgress, ProgressListener, ProgressListeners,
    SelfOrganizingMap, SomTrainer, TrainingState,
};
pub use storage::{load_snapshot, save_snapshot, SomFormat};
pub use vector::{BinaryStrategy, BitVector, GeneratedSource, InputCount, InputSource, RealStrategy, VectorStrategy};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = SomConfig::default();
        assert_eq!(config.cycles_per_node, DEFAULT_CYCLES_PER_NODE);
        assert_eq!(config.topology, Topology::Toroidal);
        assert!(config.validate().is_ok());
    }
}
