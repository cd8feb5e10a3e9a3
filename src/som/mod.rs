//! Self-Organizing Map (SOM) grid, training and queries.
//!
//! - **Grid**: flat row-major storage of reference vectors with bounded or
//!   toroidal distances (grid.rs)
//! - **Influence**: neighbourhood shapes and the shrinking range schedule
//!   (influence.rs)
//! - **Parallel**: worker pool for best-match search and region updates
//!   (parallel.rs)
//! - **Search**: exhaustive and quick best-match search (search.rs)
//! - **Training**: the training state machine (training.rs)

mod grid;
mod map;
pub mod influence;
pub mod parallel;
pub mod progress;
pub mod search;
pub mod training;

pub use grid::{axis_distance, CellMut, Grid, Region};
pub use influence::InfluenceTable;
pub use map::SelfOrganizingMap;
pub use parallel::{PartitionPlan, WorkerPool};
pub use progress::{
    CancellationToken, LogProgress, NeverCancel, NoProgress, ProgressListener, ProgressListeners, StopAfter,
};
pub use search::{exhaustive_search, BestMatchCache, FastMatch, QuickSearch};
pub use training::{SomTrainer, TrainingState};
