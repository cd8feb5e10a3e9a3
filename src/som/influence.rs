//! Time-decayed neighbourhood influence.
//!
//! The neighbourhood range shrinks from `start_range` to `final_range`
//! (fractions of the grid's longest distance) following
//! `start * exp(ln(final / start) * t^0.3)`, so it collapses quickly early on
//! and then fine-tunes for most of the run. The overall influence also fades
//! linearly with `1 - t`.

use crate::config::{Neighborhood, Topology};

/// Value the Gaussian reaches at the maximum range; smaller values are cut.
pub const GAUSSIAN_FLOOR: f64 = 0.001;

/// Number of influence recalculations per `cycles_per_node * nodes` cycles.
const RECALCULATIONS: usize = 2560;

/// Steps between influence table recalculations.
#[inline]
pub fn recalculation_interval(nodes: usize, cycles_per_node: usize) -> usize {
    (nodes * cycles_per_node / RECALCULATIONS).max(1)
}

/// Neighbourhood range at training time `t`, as a fraction of the longest distance.
#[inline]
pub fn range_fraction(t: f64, start_range: f64, final_range: f64) -> f64 {
    start_range * ((final_range / start_range).ln() * t.powf(0.3)).exp()
}

/// Longest grid distance: the diagonal, or half of it on a torus.
pub fn longest_distance(width: usize, height: usize, topology: Topology) -> f64 {
    let (w, h) = (width as f64, height as f64);
    match topology {
        Topology::Bounded => (w * w + h * h).sqrt(),
        Topology::Toroidal => ((w / 2.0) * (w / 2.0) + (h / 2.0) * (h / 2.0)).sqrt(),
    }
}

/// Neighbourhood weight at grid `distance` for a given maximum range.
pub fn neighborhood_shape(shape: Neighborhood, distance: f64, max_range: f64) -> f64 {
    if max_range <= 0.0 {
        return if distance == 0.0 { 1.0 } else { 0.0 };
    }

    let ratio_sq = (distance * distance) / (max_range * max_range);
    match shape {
        // Beyond the range the bell would drop under the floor.
        Neighborhood::Gaussian if ratio_sq > 1.0 => 0.0,
        Neighborhood::Gaussian => (GAUSSIAN_FLOOR.ln() * ratio_sq).exp(),
        Neighborhood::MexicanHat => (1.0 - ratio_sq).max(0.0),
        Neighborhood::Linear => (1.0 - distance / max_range).max(0.0),
    }
}

/// Influence by absolute grid offset from the best matching unit.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceTable {
    max_range: f64,
    reach_x: usize,
    reach_y: usize,
    values: Vec<f64>,
}

impl InfluenceTable {
    /// Computes the table for training time `t` in `[0, 1)`.
    pub fn new(
        shape: Neighborhood,
        t: f64,
        width: usize,
        height: usize,
        topology: Topology,
        start_range: f64,
        final_range: f64,
    ) -> Self {
        let max_range = range_fraction(t, start_range, final_range) * longest_distance(width, height, topology);
        let time_influence = 1.0 - t;

        let (limit_x, limit_y) = match topology {
            Topology::Bounded => (width.saturating_sub(1), height.saturating_sub(1)),
            Topology::Toroidal => (width / 2, height / 2),
        };
        let reach = max_range.floor().max(0.0) as usize;
        let reach_x = reach.min(limit_x);
        let reach_y = reach.min(limit_y);

        let mut values = Vec::with_capacity((reach_x + 1) * (reach_y + 1));
        for dy in 0..=reach_y {
            for dx in 0..=reach_x {
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                values.push(0.5 * time_influence * neighborhood_shape(shape, distance, max_range));
            }
        }

        Self {
            max_range,
            reach_x,
            reach_y,
            values,
        }
    }

    /// A table that leaves every node untouched.
    pub fn inactive() -> Self {
        Self {
            max_range: 0.0,
            reach_x: 0,
            reach_y: 0,
            values: vec![0.0],
        }
    }

    /// Influence at absolute offset `(dx, dy)`; zero beyond the reach.
    #[inline]
    pub fn get(&self, dx: usize, dy: usize) -> f64 {
        if dx > self.reach_x || dy > self.reach_y {
            return 0.0;
        }
        self.values[dy * (self.reach_x + 1) + dx]
    }

    /// Largest offsets with possibly non-zero influence.
    #[inline]
    pub fn reach(&self) -> (usize, usize) {
        (self.reach_x, self.reach_y)
    }

    /// Current maximum range in grid units.
    #[inline]
    pub fn max_range(&self) -> f64 {
        self.max_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_schedule() {
        assert!((range_fraction(0.0, 1.0, 0.05) - 1.0).abs() < 1e-12);
        assert!((range_fraction(1.0, 1.0, 0.05) - 0.05).abs() < 1e-12);
        assert!(range_fraction(0.5, 1.0, 0.05) < range_fraction(0.2, 1.0, 0.05));
    }

    #[test]
    fn test_recalculation_interval() {
        assert_eq!(recalculation_interval(16, 16), 1);
        assert_eq!(recalculation_interval(64 * 64, 16), 25);
    }

    #[test]
    fn test_shapes_at_boundaries() {
        for shape in [Neighborhood::Gaussian, Neighborhood::MexicanHat, Neighborhood::Linear] {
            assert_eq!(neighborhood_shape(shape, 0.0, 3.0), 1.0);
            assert!(neighborhood_shape(shape, 3.5, 3.0) == 0.0);
        }
        let at_range = neighborhood_shape(Neighborhood::Gaussian, 3.0, 3.0);
        assert!((at_range - GAUSSIAN_FLOOR).abs() < 1e-9);
        assert!((neighborhood_shape(Neighborhood::Linear, 1.5, 3.0) - 0.5).abs() < 1e-12);
        assert!((neighborhood_shape(Neighborhood::MexicanHat, 1.5, 3.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_table_is_symmetric_and_bounded() {
        let table = InfluenceTable::new(Neighborhood::Gaussian, 0.1, 10, 10, Topology::Bounded, 1.0, 0.05);
        let (rx, ry) = table.reach();
        assert!(rx > 0 && rx == ry);
        assert!((table.get(0, 0) - 0.45).abs() < 1e-12);
        for d in 0..=rx.min(ry) {
            for e in 0..=rx.min(ry) {
                assert_eq!(table.get(d, e), table.get(e, d));
                assert!(table.get(d, e) >= 0.0);
            }
        }
        assert_eq!(table.get(rx + 1, 0), 0.0);
    }

    #[test]
    fn test_toroidal_reach_is_half_grid() {
        let table = InfluenceTable::new(Neighborhood::Linear, 0.0, 8, 6, Topology::Toroidal, 1.0, 0.05);
        assert_eq!(table.reach(), (4, 3));
    }

    #[test]
    fn test_influence_decays_with_time() {
        for shape in [Neighborhood::Gaussian, Neighborhood::MexicanHat, Neighborhood::Linear] {
            for (dx, dy) in [(0, 0), (1, 0), (1, 1), (3, 2)] {
                let mut previous = f64::INFINITY;
                for step in 0..100 {
                    let t = step as f64 / 100.0;
                    let table = InfluenceTable::new(shape, t, 12, 12, Topology::Toroidal, 1.0, 0.05);
                    let value = table.get(dx, dy);
                    assert!(value <= previous, "{shape:?} ({dx},{dy}) rose at t={t}");
                    previous = value;
                }
            }
        }
    }
}
