//! Fixed-size worker pool for the two parallel training operations.
//!
//! Every training step runs stop-the-world: the coordinator splits a region
//! into contiguous, disjoint partitions, hands one to each worker and blocks
//! until all of them are done. Writers receive `&mut` sub-slices carved with
//! `split_at_mut`, so the partitions cannot overlap.

use crate::error::{Result, SomError};
use crate::som::search::exhaustive_search;
use log::trace;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;

/// Cut points splitting `len` row-major items into contiguous ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    bounds: Vec<usize>,
}

impl PartitionPlan {
    /// Splits `len` items into `parts` ranges whose sizes differ by at most one.
    pub fn new(len: usize, parts: usize) -> Self {
        let parts = parts.max(1);
        let bounds = (0..=parts).map(|i| i * len / parts).collect();
        Self { bounds }
    }

    /// Number of items covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.bounds.last().copied().unwrap_or(0)
    }

    /// Returns true if the plan covers no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of partitions.
    #[inline]
    pub fn parts(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Item range of partition `part`.
    pub fn range(&self, part: usize) -> Range<usize> {
        self.bounds[part]..self.bounds[part + 1]
    }

    /// Borrows each partition of `items`.
    pub fn split<'a, T>(&self, items: &'a [T]) -> Vec<&'a [T]> {
        self.assert_covers(items.len());
        (0..self.parts()).map(|p| &items[self.range(p)]).collect()
    }

    /// Mutably borrows each partition of `items`.
    pub fn split_mut<'a, T>(&self, items: &'a mut [T]) -> Vec<&'a mut [T]> {
        self.assert_covers(items.len());
        let mut rest = items;
        let mut parts = Vec::with_capacity(self.parts());
        for window in self.bounds.windows(2) {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(window[1] - window[0]);
            parts.push(head);
            rest = tail;
        }
        parts
    }

    fn assert_covers(&self, len: usize) {
        assert_eq!(
            self.len(),
            len,
            "partition plan covers {} items but the region has {}",
            self.len(),
            len
        );
    }
}

/// Returns the cached plan, recomputing it when the region size changed.
fn refresh_plan(cache: &mut Option<PartitionPlan>, len: usize, parts: usize) -> &PartitionPlan {
    match cache.as_ref() {
        Some(plan) if plan.len() == len && plan.parts() == parts => {}
        _ => {
            trace!("Partitioning {} cells over {} workers", len, parts);
            *cache = Some(PartitionPlan::new(len, parts));
        }
    }
    cache.get_or_insert_with(|| PartitionPlan::new(len, parts))
}

/// Worker pool running best-match searches and influence updates.
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
    search_plan: Option<PartitionPlan>,
    update_plan: Option<PartitionPlan>,
}

impl WorkerPool {
    /// Creates a pool of `threads` workers; 0 uses all available cores.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = if threads == 0 {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            threads
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("som-worker-{i}"))
            .build()
            .map_err(|e| SomError::Config(format!("Cannot start worker pool: {e}")))?;

        Ok(Self {
            pool,
            threads,
            search_plan: None,
            update_plan: None,
        })
    }

    /// Number of workers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Index and score of the lowest-scoring cell.
    ///
    /// Each worker scans its range keeping the first minimum; partial results
    /// are reduced in worker order, so ties resolve to the lowest index just
    /// like a sequential scan.
    pub fn best_match<V, F>(&mut self, cells: &[V], score: F) -> Option<(usize, f64)>
    where
        V: Sync,
        F: Fn(&V) -> f64 + Sync,
    {
        let plan = refresh_plan(&mut self.search_plan, cells.len(), self.threads);
        let parts = plan.split(cells);
        let offsets: Vec<usize> = (0..plan.parts()).map(|p| plan.range(p).start).collect();

        let partials: Vec<Option<(usize, f64)>> = self.pool.install(|| {
            parts
                .par_iter()
                .zip(offsets.par_iter())
                .map(|(part, &offset)| {
                    exhaustive_search(part, &score).map(|(index, best)| (offset + index, best))
                })
                .collect()
        });

        partials.into_iter().flatten().fold(None, |best, (index, value)| match best {
            None => Some((index, value)),
            Some((_, current)) if value < current => Some((index, value)),
            _ => best,
        })
    }

    /// Runs `update` on every item, each partition on its own worker.
    pub fn apply<T, F>(&mut self, items: &mut [T], update: F)
    where
        T: Send,
        F: Fn(&mut T) + Sync,
    {
        let plan = refresh_plan(&mut self.update_plan, items.len(), self.threads);
        let parts = plan.split_mut(items);

        self.pool.install(|| {
            parts.into_par_iter().for_each(|part| {
                for item in part.iter_mut() {
                    update(item);
                }
            });
        });
    }
}
