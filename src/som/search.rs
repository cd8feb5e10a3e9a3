//! Best-match search: exhaustive scan and the quick local heuristic.

use crate::som::Grid;

/// Index and score of the lowest-scoring cell; the first one wins ties.
pub fn exhaustive_search<V, F>(cells: &[V], score: F) -> Option<(usize, f64)>
where
    F: Fn(&V) -> f64,
{
    let mut best: Option<(usize, f64)> = None;
    for (index, cell) in cells.iter().enumerate() {
        let value = score(cell);
        let better = match best {
            None => true,
            Some((_, current)) => value < current,
        };
        if better {
            best = Some((index, value));
        }
    }
    best
}

/// Greedy hill-climbing from a previous best match.
///
/// Each round scores the unvisited 8-neighbourhood of the current cell and
/// moves to the best strictly better neighbour; it stops at a local minimum.
#[derive(Debug, Default)]
pub struct QuickSearch {
    visited: Vec<u32>,
    stamp: u32,
    neighbors: Vec<usize>,
}

impl QuickSearch {
    /// Creates a searcher; scratch space is sized on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Local minimum reached from `start`, with its score.
    pub fn search<V, F>(&mut self, grid: &Grid<V>, start: (usize, usize), score: F) -> ((usize, usize), f64)
    where
        F: Fn(&V) -> f64,
    {
        self.next_stamp(grid.len());
        let cells = grid.cells();

        let mut current = grid.index_of(start.0, start.1);
        let mut best = score(&cells[current]);
        self.visited[current] = self.stamp;

        loop {
            grid.neighbors_into(current, &mut self.neighbors);

            let mut improved: Option<(usize, f64)> = None;
            for &neighbor in &self.neighbors {
                if self.visited[neighbor] == self.stamp {
                    continue;
                }
                self.visited[neighbor] = self.stamp;

                let value = score(&cells[neighbor]);
                let threshold = improved.map_or(best, |(_, v)| v);
                if value < threshold {
                    improved = Some((neighbor, value));
                }
            }

            match improved {
                Some((index, value)) => {
                    current = index;
                    best = value;
                }
                None => return (grid.position_of(current), best),
            }
        }
    }

    fn next_stamp(&mut self, len: usize) {
        if self.visited.len() != len {
            self.visited = vec![0; len];
            self.stamp = 0;
        }
        self.stamp = self.stamp.wrapping_add(1);
        if self.stamp == 0 {
            self.visited.fill(0);
            self.stamp = 1;
        }
    }
}

/// Last best-match position of every input vector.
#[derive(Debug, Clone, Default)]
pub struct BestMatchCache {
    positions: Vec<Option<(usize, usize)>>,
}

impl BestMatchCache {
    /// An empty cache for `inputs` vectors.
    pub fn new(inputs: usize) -> Self {
        Self {
            positions: vec![None; inputs],
        }
    }

    /// Cached position of input `row`.
    #[inline]
    pub fn get(&self, row: usize) -> Option<(usize, usize)> {
        self.positions.get(row).copied().flatten()
    }

    /// Records the best match of input `row`.
    #[inline]
    pub fn set(&mut self, row: usize, position: (usize, usize)) {
        if let Some(slot) = self.positions.get_mut(row) {
            *slot = Some(position);
        }
    }

    /// Scales every position by two after the grid doubled.
    pub fn grow(&mut self) {
        for (x, y) in self.positions.iter_mut().flatten() {
            *x *= 2;
            *y *= 2;
        }
    }

    /// Number of inputs tracked.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if no inputs are tracked.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Policy deciding which search finds the best match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastMatch {
    /// Exhaustive search only.
    Disabled,
    /// Both searches run; the exhaustive result is used.
    Verifying {
        /// Consecutive agreements so far.
        agreements: usize,
        /// Agreements needed to switch.
        required: usize,
    },
    /// Quick search only. There is no way back.
    QuickOnly,
}

impl FastMatch {
    /// Starts verification for a source of `inputs` vectors.
    pub fn verifying(inputs: usize) -> Self {
        FastMatch::Verifying {
            agreements: 0,
            required: 2 * inputs,
        }
    }

    /// Records whether both searches agreed. Returns true on switching to
    /// quick-only search.
    pub fn record(&mut self, agreed: bool) -> bool {
        if let FastMatch::Verifying { agreements, required } = *self {
            if !agreed {
                *self = FastMatch::Verifying { agreements: 0, required };
            } else if agreements + 1 >= required {
                *self = FastMatch::QuickOnly;
                return true;
            } else {
                *self = FastMatch::Verifying {
                    agreements: agreements + 1,
                    required,
                };
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Topology;

    /// A bowl with its minimum at (cx, cy).
    fn bowl(width: usize, height: usize, topology: Topology, cx: usize, cy: usize) -> Grid<f64> {
        Grid::from_fn(width, height, topology, |x, y| {
            let dx = x.abs_diff(cx) as f64;
            let dy = y.abs_diff(cy) as f64;
            dx * dx + dy * dy
        })
    }

    #[test]
    fn test_exhaustive_first_minimum() {
        let cells = [3.0, 1.0, 2.0, 1.0];
        assert_eq!(exhaustive_search(&cells, |v| *v), Some((1, 1.0)));
        assert_eq!(exhaustive_search::<f64, _>(&[], |v| *v), None);
    }

    #[test]
    fn test_quick_finds_bowl_minimum() {
        let grid = bowl(9, 7, Topology::Bounded, 6, 2);
        let mut quick = QuickSearch::new();
        for start in [(0, 0), (8, 6), (3, 3), (6, 2)] {
            let (position, value) = quick.search(&grid, start, |v| *v);
            assert_eq!(position, (6, 2));
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn test_quick_wraps_on_torus() {
        // Minimum at the left edge, start at the right edge.
        let grid = Grid::from_fn(8, 4, Topology::Toroidal, |x, _| match x {
            0 => 0.0,
            7 => 1.0,
            _ => 5.0,
        });
        let mut quick = QuickSearch::new();
        let (position, _) = quick.search(&grid, (7, 1), |v| *v);
        assert_eq!(position.0, 0);
    }

    #[test]
    fn test_quick_stops_at_local_minimum() {
        let grid = Grid::from_fn(5, 1, Topology::Bounded, |x, _| [2.0, 0.0, 3.0, 1.0, 4.0][x]);
        let mut quick = QuickSearch::new();
        let (position, value) = quick.search(&grid, (4, 0), |v| *v);
        assert_eq!(position, (3, 0));
        assert_eq!(value, 1.0);
    }

    #[test]
    fn test_cache_grow() {
        let mut cache = BestMatchCache::new(3);
        cache.set(0, (1, 2));
        cache.set(2, (0, 3));
        cache.grow();
        assert_eq!(cache.get(0), Some((2, 4)));
        assert_eq!(cache.get(1), None);
        assert_eq!(cache.get(2), Some((0, 6)));
    }

    #[test]
    fn test_fast_match_switches_after_consecutive_agreements() {
        let mut policy = FastMatch::verifying(2);
        assert!(!policy.record(true));
        assert!(!policy.record(true));
        assert!(!policy.record(false));
        assert_eq!(policy, FastMatch::Verifying { agreements: 0, required: 4 });
        assert!(!policy.record(true));
        assert!(!policy.record(true));
        assert!(!policy.record(true));
        assert!(policy.record(true));
        assert_eq!(policy, FastMatch::QuickOnly);
        assert!(!policy.record(false));
        assert_eq!(policy, FastMatch::QuickOnly);
    }
}
