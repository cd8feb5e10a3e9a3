//! Configuration for the Cartograph SOM engine.

use crate::error::{Result, SomError};
use serde::{Deserialize, Serialize};

/// Default number of training cycles per grid node and phase.
pub const DEFAULT_CYCLES_PER_NODE: usize = 16;

/// Grid edge handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Edges are hard limits; neighbourhoods are clipped.
    Bounded,
    /// Opposite edges are adjacent.
    Toroidal,
}

/// Shape of the neighbourhood function around the best matching unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Neighborhood {
    /// Gaussian bell reaching 0.001 at the maximum range.
    Gaussian,
    /// `1 - d²/r²`, clipped at zero.
    MexicanHat,
    /// `1 - d/r`, clipped at zero.
    Linear,
}

impl Neighborhood {
    fn code(self) -> u32 {
        match self {
            Neighborhood::Gaussian => 0,
            Neighborhood::MexicanHat => 1,
            Neighborhood::Linear => 2,
        }
    }
}

/// Flags persisted with a map describing how it was created.
///
/// Encoded as an integer: bits 0-1 hold the neighbourhood shape,
/// 4 marks a toroidal topology, 8 growing and 16 fast best-match search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationMode {
    /// Neighbourhood shape.
    pub neighborhood: Neighborhood,
    /// Grid topology.
    pub topology: Topology,
    /// Map was grown during optimization.
    pub grow: bool,
    /// Quick best-match search was enabled.
    pub fast_best_match: bool,
}

const MODE_NEIGHBORHOOD_MASK: u32 = 3;
const MODE_TOROIDAL: u32 = 4;
const MODE_GROW: u32 = 8;
const MODE_FAST_BEST_MATCH: u32 = 16;

impl CreationMode {
    /// Encodes the flags as an integer.
    pub fn to_bits(&self) -> u32 {
        let mut bits = self.neighborhood.code();
        if self.topology == Topology::Toroidal {
            bits |= MODE_TOROIDAL;
        }
        if self.grow {
            bits |= MODE_GROW;
        }
        if self.fast_best_match {
            bits |= MODE_FAST_BEST_MATCH;
        }
        bits
    }

    /// Decodes flags previously produced by [`CreationMode::to_bits`].
    pub fn from_bits(bits: u32) -> Result<Self> {
        let known = MODE_NEIGHBORHOOD_MASK | MODE_TOROIDAL | MODE_GROW | MODE_FAST_BEST_MATCH;
        if bits & !known != 0 {
            return Err(SomError::format(format!("unknown creation mode bits {bits}")));
        }

        let neighborhood = match bits & MODE_NEIGHBORHOOD_MASK {
            0 => Neighborhood::Gaussian,
            1 => Neighborhood::MexicanHat,
            2 => Neighborhood::Linear,
            other => {
                return Err(SomError::format(format!("unknown neighborhood code {other}")));
            }
        };
        let topology = if bits & MODE_TOROIDAL != 0 {
            Topology::Toroidal
        } else {
            Topology::Bounded
        };

        Ok(Self {
            neighborhood,
            topology,
            grow: bits & MODE_GROW != 0,
            fast_best_match: bits & MODE_FAST_BEST_MATCH != 0,
        })
    }
}

/// Self-Organizing Map configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SomConfig {
    /// Final grid width (number of columns).
    /// Default: 16.
    pub width: usize,

    /// Final grid height (number of rows).
    /// Default: 16.
    pub height: usize,

    /// Edge handling.
    /// Default: toroidal.
    pub topology: Topology,

    /// Neighbourhood function.
    /// Default: Gaussian.
    pub neighborhood: Neighborhood,

    /// Number of grid doublings during training. Training starts on a
    /// `(width >> grow_steps) x (height >> grow_steps)` grid.
    /// Default: 0 (no growing).
    pub grow_steps: u32,

    /// Enable the quick best-match heuristic once it has been verified.
    /// Default: false.
    pub fast_best_match: bool,

    /// Training cycles per node and optimization phase.
    /// Default: 16.
    pub cycles_per_node: usize,

    /// Initial neighbourhood range as a fraction of the grid's longest distance.
    /// Default: 1.0.
    pub start_range: f64,

    /// Final neighbourhood range as a fraction of the grid's longest distance.
    /// Default: 0.05.
    pub final_range: f64,

    /// Number of worker threads.
    /// Default: 0 (use all available cores).
    pub threads: usize,

    /// Random seed for reproducibility.
    /// Default: None (random).
    pub seed: Option<u64>,
}

impl Default for SomConfig {
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
            topology: Topology::Toroidal,
            neighborhood: Neighborhood::Gaussian,
            grow_steps: 0,
            fast_best_match: false,
            cycles_per_node: DEFAULT_CYCLES_PER_NODE,
            start_range: 1.0,
            final_range: 0.05,
            threads: 0,
            seed: None,
        }
    }
}

impl SomConfig {
    /// Returns the total number of nodes of the final grid.
    #[inline]
    pub fn total_nodes(&self) -> usize {
        self.width * self.height
    }

    /// Returns the grid size training starts with.
    pub fn initial_size(&self) -> (usize, usize) {
        (self.width >> self.grow_steps, self.height >> self.grow_steps)
    }

    /// Returns the persisted creation flags for this configuration.
    pub fn creation_mode(&self) -> CreationMode {
        CreationMode {
            neighborhood: self.neighborhood,
            topology: self.topology,
            grow: self.grow_steps > 0,
            fast_best_match: self.fast_best_match,
        }
    }

    /// Builds a configuration matching a persisted map.
    ///
    /// Growing is not repeated for a loaded map, so `grow_steps` is zero.
    pub fn from_creation_mode(mode: CreationMode, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            topology: mode.topology,
            neighborhood: mode.neighborhood,
            fast_best_match: mode.fast_best_match,
            ..Default::default()
        }
    }

    /// Rejects configurations the training loop cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SomError::Config(format!(
                "Grid must not be empty ({}x{})",
                self.width, self.height
            )));
        }
        if self.cycles_per_node == 0 {
            return Err(SomError::Config("cycles_per_node must be positive".to_string()));
        }
        if !(self.start_range > 0.0 && self.final_range > 0.0) {
            return Err(SomError::Config(format!(
                "Neighbourhood ranges must be positive (start {}, final {})",
                self.start_range, self.final_range
            )));
        }
        if self.grow_steps > 0 {
            if self.topology != Topology::Toroidal {
                return Err(SomError::Config(
                    "Growing is only supported with toroidal topology".to_string(),
                ));
            }
            if self.grow_steps >= usize::BITS {
                return Err(SomError::Config(format!("Too many grow steps: {}", self.grow_steps)));
            }
            let factor = 1usize << self.grow_steps;
            if self.width % factor != 0 || self.height % factor != 0 {
                return Err(SomError::Config(format!(
                    "Grid {}x{} cannot be reached by {} doublings",
                    self.width, self.height, self.grow_steps
                )));
            }
        }
        Ok(())
    }
}
