//! SOM training loop.
//!
//! Training runs through a small state machine:
//!
//! ```text
//! Uninitialized -> Normalizing -> Optimizing(0) [-> Growing(1) -> Optimizing(1)]* -> Completed
//! ```
//!
//! Each optimization phase runs `cycles_per_node` steps per grid node. A
//! step normalizes the next input, finds its best matching unit and pulls
//! every node within the current range towards it. Best-match search and
//! the neighbourhood update run on the worker pool; the coordinator waits
//! for both before starting the next step. A cancellation token is polled
//! before every step.

use crate::config::{SomConfig, Topology};
use crate::error::{Result, SomError};
use crate::som::grid::axis_distance;
use crate::som::influence::{recalculation_interval, InfluenceTable};
use crate::som::parallel::WorkerPool;
use crate::som::progress::{CancellationToken, ProgressListener};
use crate::som::search::{BestMatchCache, FastMatch, QuickSearch};
use crate::som::{Grid, SelfOrganizingMap};
use crate::vector::{InputCount, InputSource, VectorStrategy};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Where the trainer is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    /// Nothing trained yet.
    Uninitialized,
    /// Collecting input statistics.
    Normalizing,
    /// Running optimization phase `phase`.
    Optimizing {
        /// Zero-based phase number.
        phase: u32,
    },
    /// Doubling the grid before phase `phase`.
    Growing {
        /// Phase about to start.
        phase: u32,
    },
    /// All phases ran to completion.
    Completed,
    /// Stopped early by the cancellation token; the grid is usable but
    /// undertrained.
    Cancelled,
}

impl TrainingState {
    /// Returns true once the grid can be queried or saved.
    pub fn is_finished(&self) -> bool {
        matches!(self, TrainingState::Completed | TrainingState::Cancelled)
    }
}

/// Position and schedule of one optimization phase.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    /// Cycles finished in earlier phases.
    done: usize,
    /// Cycles of all phases together.
    total: usize,
}

/// Trains a [`SelfOrganizingMap`] on vectors of one [`VectorStrategy`].
pub struct SomTrainer<S: VectorStrategy> {
    config: SomConfig,
    strategy: S,
    grid: Grid<S::Vector>,
    state: TrainingState,
    rng: ChaCha8Rng,
    pool: WorkerPool,
    quick: QuickSearch,
    fast_match: FastMatch,
    cache: Option<BestMatchCache>,
    influence: InfluenceTable,
}

impl<S: VectorStrategy> SomTrainer<S> {
    /// Creates a trainer, rejecting invalid configurations.
    pub fn new(config: SomConfig, strategy: S) -> Result<Self> {
        config.validate()?;
        if strategy.dimension() == 0 {
            return Err(SomError::Config("Vectors must have at least one dimension".to_string()));
        }

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let pool = WorkerPool::new(config.threads)?;

        Ok(Self {
            grid: Grid::empty(config.topology),
            config,
            strategy,
            state: TrainingState::Uninitialized,
            rng,
            pool,
            quick: QuickSearch::new(),
            fast_match: FastMatch::Disabled,
            cache: None,
            influence: InfluenceTable::inactive(),
        })
    }

    /// Current state.
    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Configuration in use.
    pub fn config(&self) -> &SomConfig {
        &self.config
    }

    /// Vector strategy, including collected statistics.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Current grid; empty before training.
    pub fn grid(&self) -> &Grid<S::Vector> {
        &self.grid
    }

    /// Best-match search policy in effect.
    pub fn fast_match(&self) -> FastMatch {
        self.fast_match
    }

    /// Last best-match position recorded for input `row`, if fast matching
    /// keeps a cache.
    pub fn cached_best_match(&self, row: usize) -> Option<(usize, usize)> {
        self.cache.as_ref().and_then(|cache| cache.get(row))
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    /// Number of training cycles across all phases.
    pub fn total_cycles(&self) -> usize {
        let (w, h) = self.config.initial_size();
        (0..=self.config.grow_steps)
            .map(|phase| self.config.cycles_per_node * (w << phase) * (h << phase))
            .sum()
    }

    /// Trains on `source`.
    ///
    /// An empty finite source is a no-op and leaves the trainer
    /// `Uninitialized`. Cancellation ends training between steps with state
    /// `Cancelled`.
    pub fn train<I, P, C>(&mut self, source: &I, progress: &mut P, cancel: &C) -> Result<TrainingState>
    where
        I: InputSource<S::Vector> + ?Sized,
        P: ProgressListener + ?Sized,
        C: CancellationToken + ?Sized,
    {
        let count = source.count();
        if count == InputCount::Finite(0) {
            info!("No input vectors, nothing to train");
            return Ok(self.state);
        }

        self.state = TrainingState::Normalizing;
        match count {
            InputCount::Finite(n) => {
                progress.start("Collecting input statistics", 0, n as u64);
                self.strategy.collect_statistics(source, n)?;
                progress.stop("Input statistics collected");
            }
            InputCount::Unbounded => {
                info!("Generated input, skipping normalization statistics");
            }
        }

        let (width, height) = self.config.initial_size();
        let strategy = &self.strategy;
        let rng = &mut self.rng;
        self.grid = Grid::from_fn(width, height, self.config.topology, |_, _| strategy.random_vector(rng));

        (self.fast_match, self.cache) = match count {
            InputCount::Finite(n) if self.config.fast_best_match => {
                (FastMatch::verifying(n), Some(BestMatchCache::new(n)))
            }
            _ => (FastMatch::Disabled, None),
        };

        let total = self.total_cycles();
        info!(
            "Training SOM: {} start grid, {} phase(s), {} cycles, {} workers",
            format_size(width, height),
            self.config.grow_steps + 1,
            total,
            self.pool.threads()
        );

        let mut done = 0;
        for phase in 0..=self.config.grow_steps {
            if phase > 0 {
                self.state = TrainingState::Growing { phase };
                self.grow()?;
            }

            self.state = TrainingState::Optimizing { phase };
            let finished = self.optimize(source, count, Schedule { done, total }, progress, cancel)?;
            if !finished {
                warn!("Training cancelled in phase {} after {} cycles", phase, done);
                self.state = TrainingState::Cancelled;
                return Ok(self.state);
            }
            done += self.config.cycles_per_node * self.grid.len();
        }

        self.state = TrainingState::Completed;
        info!("SOM training completed");
        Ok(self.state)
    }

    /// Runs one optimization phase; returns false when cancelled.
    fn optimize<I, P, C>(
        &mut self,
        source: &I,
        count: InputCount,
        schedule: Schedule,
        progress: &mut P,
        cancel: &C,
    ) -> Result<bool>
    where
        I: InputSource<S::Vector> + ?Sized,
        P: ProgressListener + ?Sized,
        C: CancellationToken + ?Sized,
    {
        let cycles = self.config.cycles_per_node * self.grid.len();
        let interval = recalculation_interval(self.grid.len(), self.config.cycles_per_node);
        let label = format!("Optimizing {} map", format_size(self.grid.width(), self.grid.height()));

        info!("{}: {} cycles", label, cycles);
        progress.start(&label, 0, cycles as u64);

        for cycle in 0..cycles {
            if cancel.should_stop() {
                progress.stop("Optimization cancelled");
                return Ok(false);
            }

            if cycle % interval == 0 {
                let t = (schedule.done + cycle) as f64 / schedule.total as f64;
                self.influence = InfluenceTable::new(
                    self.config.neighborhood,
                    t,
                    self.grid.width(),
                    self.grid.height(),
                    self.config.topology,
                    self.config.start_range,
                    self.config.final_range,
                );
                debug!("t={:.4}: max range {:.3}", t, self.influence.max_range());
                progress.update(cycle as u64);
            }

            self.strategy.begin_cycle(&mut self.rng);

            let step = schedule.done + cycle;
            let row = match count {
                InputCount::Finite(n) => step % n,
                InputCount::Unbounded => step,
            };

            let mut input = source.vector_at(row);
            self.strategy.check_dimension(&input)?;
            self.strategy.normalize(&mut input);

            let best = self.locate(&input, row);
            self.apply_influence(&input, best);
        }

        progress.stop(&format!("{label} done"));
        Ok(true)
    }

    /// Finds the best matching unit according to the fast-match policy.
    fn locate(&mut self, input: &S::Vector, row: usize) -> (usize, usize) {
        let cached = self.cache.as_ref().and_then(|cache| cache.get(row));

        let position = match (self.fast_match, cached) {
            (FastMatch::QuickOnly, Some(start)) => self.quick_search(input, start),
            (FastMatch::Verifying { .. }, _) => {
                let exhaustive = self.exhaustive_search(input);
                let agreed = cached.is_some_and(|start| self.quick_search(input, start) == exhaustive);
                if self.fast_match.record(agreed) {
                    info!("Quick best-match search verified, switching to quick-only search");
                }
                exhaustive
            }
            _ => self.exhaustive_search(input),
        };

        if let Some(cache) = self.cache.as_mut() {
            cache.set(row, position);
        }
        position
    }

    fn exhaustive_search(&mut self, input: &S::Vector) -> (usize, usize) {
        let strategy = &self.strategy;
        let (index, _) = self
            .pool
            .best_match(self.grid.cells(), |reference| strategy.dissimilarity(reference, input))
            .unwrap_or((0, 0.0));
        self.grid.position_of(index)
    }

    fn quick_search(&mut self, input: &S::Vector, start: (usize, usize)) -> (usize, usize) {
        let strategy = &self.strategy;
        let (position, _) = self
            .quick
            .search(&self.grid, start, |reference| strategy.dissimilarity(reference, input));
        position
    }

    /// Pulls every node within range of `best` towards `input`.
    fn apply_influence(&mut self, input: &S::Vector, best: (usize, usize)) {
        let (reach_x, reach_y) = self.influence.reach();
        let region = self.grid.region(best, reach_x, reach_y);
        let (width, height) = (self.grid.width(), self.grid.height());
        let topology: Topology = self.grid.topology();

        let strategy = &self.strategy;
        let table = &self.influence;
        let mut cells = self.grid.region_cells_mut(&region);

        self.pool.apply(&mut cells, |cell| {
            let dx = axis_distance(cell.x, best.0, width, topology);
            let dy = axis_distance(cell.y, best.1, height, topology);
            let influence = table.get(dx, dy);
            if influence > 0.0 {
                strategy.update_reference(cell.vector, input, influence);
            }
        });
    }

    /// Doubles the grid and the cached best-match positions.
    fn grow(&mut self) -> Result<()> {
        let strategy = &self.strategy;
        let rng = &mut self.rng;
        let grown = self.grid.grow(|a, b| strategy.mean_vector(a, b, rng))?;

        info!(
            "Growing map from {} to {}",
            format_size(self.grid.width(), self.grid.height()),
            format_size(grown.width(), grown.height())
        );
        self.grid = grown;
        if let Some(cache) = self.cache.as_mut() {
            cache.grow();
        }
        Ok(())
    }

    /// Best matching unit of `vector` on the current grid.
    pub fn best_match_location(&mut self, vector: &S::Vector) -> Result<(usize, usize)> {
        if self.grid.is_empty() {
            return Err(SomError::EmptyInput("The map has not been trained".to_string()));
        }
        self.strategy.check_dimension(vector)?;
        let mut input = vector.clone();
        self.strategy.normalize(&mut input);
        Ok(self.exhaustive_search(&input))
    }

    /// Quick best-match search from `start` on the current grid.
    pub fn quick_best_match_location(&mut self, vector: &S::Vector, start: (usize, usize)) -> Result<(usize, usize)> {
        if self.grid.is_empty() {
            return Err(SomError::EmptyInput("The map has not been trained".to_string()));
        }
        self.strategy.check_dimension(vector)?;
        let mut input = vector.clone();
        self.strategy.normalize(&mut input);
        Ok(self.quick_search(&input, start))
    }

    /// Hands out the trained map.
    pub fn into_map(self) -> Result<SelfOrganizingMap<S>> {
        if !self.state.is_finished() {
            return Err(SomError::EmptyInput(format!(
                "No trained map available (state {:?})",
                self.state
            )));
        }
        let mode = self.config.creation_mode();
        Ok(SelfOrganizingMap::new(mode, self.strategy, self.grid))
    }
}

fn format_size(width: usize, height: usize) -> String {
    format!("{width}x{height}")
}
