//! Grid of reference vectors and its topology.

use crate::config::Topology;
use crate::error::{Result, SomError};
use serde::{Deserialize, Serialize};

/// Distance between two coordinates along one axis of length `size`.
///
/// On a torus the shorter way around is taken.
#[inline]
pub fn axis_distance(a: usize, b: usize, size: usize, topology: Topology) -> usize {
    let direct = a.abs_diff(b);
    match topology {
        Topology::Bounded => direct,
        Topology::Toroidal => direct.min(size - direct),
    }
}

/// A rectangle of cells anchored at `(x0, y0)`.
///
/// On a torus the rectangle continues across the right and bottom edges;
/// it never covers a cell twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First column.
    pub x0: usize,
    /// First row.
    pub y0: usize,
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl Region {
    /// Number of cells in the region.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Returns true if the region contains no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one grid cell, tagged with its position.
#[derive(Debug)]
pub struct CellMut<'a, V> {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// The cell's reference vector.
    pub vector: &'a mut V,
}

/// A `width x height` grid of reference vectors stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<V> {
    width: usize,
    height: usize,
    topology: Topology,
    cells: Vec<V>,
}

impl<V> Grid<V> {
    /// Builds a grid by calling `init(x, y)` for every cell, rows first.
    pub fn from_fn<F>(width: usize, height: usize, topology: Topology, mut init: F) -> Self
    where
        F: FnMut(usize, usize) -> V,
    {
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                cells.push(init(x, y));
            }
        }

        Self {
            width,
            height,
            topology,
            cells,
        }
    }

    /// Wraps row-major cells, checking the shape.
    pub fn from_cells(width: usize, height: usize, topology: Topology, cells: Vec<V>) -> Result<Self> {
        let grid = Self {
            width,
            height,
            topology,
            cells,
        };
        grid.check_shape()?;
        Ok(grid)
    }

    /// A grid without cells.
    pub fn empty(topology: Topology) -> Self {
        Self {
            width: 0,
            height: 0,
            topology,
            cells: Vec::new(),
        }
    }

    /// Fails unless the cell buffer holds exactly `width * height` vectors.
    pub fn check_shape(&self) -> Result<()> {
        if self.cells.len() != self.width * self.height {
            return Err(SomError::format(format!(
                "grid {}x{} holds {} cells",
                self.width,
                self.height,
                self.cells.len()
            )));
        }
        Ok(())
    }

    /// Number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Edge handling.
    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the grid has no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All reference vectors, row-major.
    #[inline]
    pub fn cells(&self) -> &[V] {
        &self.cells
    }

    /// Converts a position to a flat index.
    #[inline]
    pub fn index_of(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Converts a flat index to `(x, y)`.
    #[inline]
    pub fn position_of(&self, index: usize) -> (usize, usize) {
        (index % self.width, index / self.width)
    }

    /// Reference vector at `(x, y)`.
    #[inline]
    pub fn reference(&self, x: usize, y: usize) -> &V {
        &self.cells[self.index_of(x, y)]
    }

    /// Mutable reference vector at `(x, y)`.
    #[inline]
    pub fn reference_mut(&mut self, x: usize, y: usize) -> &mut V {
        let index = self.index_of(x, y);
        &mut self.cells[index]
    }

    /// Replaces the reference vector at `(x, y)`.
    pub fn set_reference(&mut self, x: usize, y: usize, vector: V) {
        *self.reference_mut(x, y) = vector;
    }

    /// Maps any integer position to a valid cell index.
    ///
    /// A torus wraps coordinates; a bounded grid clamps them to the edge.
    pub fn torus_index(&self, x: isize, y: isize) -> usize {
        let (w, h) = (self.width as isize, self.height as isize);
        let (x, y) = match self.topology {
            Topology::Toroidal => (x.rem_euclid(w), y.rem_euclid(h)),
            Topology::Bounded => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        };
        y as usize * self.width + x as usize
    }

    /// Per-axis distances between two positions.
    #[inline]
    pub fn offset(&self, a: (usize, usize), b: (usize, usize)) -> (usize, usize) {
        (
            axis_distance(a.0, b.0, self.width, self.topology),
            axis_distance(a.1, b.1, self.height, self.topology),
        )
    }

    /// Euclidean grid distance between two positions.
    pub fn distance(&self, a: (usize, usize), b: (usize, usize)) -> f64 {
        let (dx, dy) = self.offset(a, b);
        ((dx * dx + dy * dy) as f64).sqrt()
    }

    /// Cells within `range_x` columns and `range_y` rows of `center`.
    pub fn region(&self, center: (usize, usize), range_x: usize, range_y: usize) -> Region {
        let (x0, width) = axis_span(center.0, range_x, self.width, self.topology);
        let (y0, height) = axis_span(center.1, range_y, self.height, self.topology);
        Region {
            x0,
            y0,
            width,
            height,
        }
    }

    /// Hands out exclusive handles to every cell of `region`, row-major
    /// from the region's anchor.
    pub fn region_cells_mut(&mut self, region: &Region) -> Vec<CellMut<'_, V>> {
        let width = self.width;
        let mut cells = Vec::with_capacity(region.len());
        if width == 0 {
            return cells;
        }

        let mut rows: Vec<(usize, &mut [V])> = self.cells.chunks_mut(width).enumerate().collect();
        rows.rotate_left(region.y0);

        for (y, row) in rows.into_iter().take(region.height) {
            let (left, right) = row.split_at_mut(region.x0);
            let columns = (region.x0..width).chain(0..region.x0);
            let vectors = right.iter_mut().chain(left.iter_mut());
            for (x, vector) in columns.zip(vectors).take(region.width) {
                cells.push(CellMut { x, y, vector });
            }
        }
        cells
    }

    /// Flat indices of the up to eight cells surrounding `index`.
    ///
    /// Wraps on a torus, skips positions outside a bounded grid and never
    /// reports the centre or a duplicate.
    pub fn neighbors_into(&self, index: usize, out: &mut Vec<usize>) {
        out.clear();
        let (x, y) = self.position_of(index);
        for dy in -1isize..=1 {
            for dx in -1isize..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if self.topology == Topology::Bounded
                    && (nx < 0 || ny < 0 || nx >= self.width as isize || ny >= self.height as isize)
                {
                    continue;
                }
                let neighbor = self.torus_index(nx, ny);
                if neighbor != index && !out.contains(&neighbor) {
                    out.push(neighbor);
                }
            }
        }
    }

    /// Doubles both dimensions.
    ///
    /// Cell `(x, y)` becomes the 2x2 block at `(2x, 2y)`: the original vector
    /// top-left, then its means with the right, lower and diagonal neighbour
    /// (wrapping around the torus).
    pub fn grow<F>(&self, mut mean: F) -> Result<Self>
    where
        V: Clone,
        F: FnMut(&V, &V) -> V,
    {
        if self.topology != Topology::Toroidal {
            return Err(SomError::Config(
                "Growing is only supported with toroidal topology".to_string(),
            ));
        }

        let (w, h) = (self.width, self.height);
        let mut cells = Vec::with_capacity(4 * w * h);
        for y in 0..h {
            let below = (y + 1) % h;
            let mut lower_row = Vec::with_capacity(2 * w);
            for x in 0..w {
                let right = (x + 1) % w;
                let origin = self.reference(x, y);
                cells.push(origin.clone());
                cells.push(mean(origin, self.reference(right, y)));
                lower_row.push(mean(origin, self.reference(x, below)));
                lower_row.push(mean(origin, self.reference(right, below)));
            }
            cells.extend(lower_row);
        }

        Ok(Self {
            width: 2 * w,
            height: 2 * h,
            topology: self.topology,
            cells,
        })
    }
}

/// First coordinate and length of the span covering `center ± range`.
fn axis_span(center: usize, range: usize, size: usize, topology: Topology) -> (usize, usize) {
    match topology {
        Topology::Bounded => {
            let start = center.saturating_sub(range);
            let end = (center + range).min(size.saturating_sub(1));
            (start, end + 1 - start)
        }
        Topology::Toroidal => {
            if 2 * range + 1 >= size {
                (0, size)
            } else {
                ((center + size - range) % size, 2 * range + 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: usize, height: usize, topology: Topology) -> Grid<usize> {
        Grid::from_fn(width, height, topology, |x, y| y * width + x)
    }

    #[test]
    fn test_coordinate_conversion() {
        let grid = numbered(5, 3, Topology::Bounded);
        assert_eq!(grid.index_of(2, 1), 7);
        assert_eq!(grid.position_of(7), (2, 1));
        assert_eq!(*grid.reference(4, 2), 14);
    }

    #[test]
    fn test_toroidal_edge_distance() {
        let grid = numbered(7, 4, Topology::Toroidal);
        for y in 0..4 {
            assert_eq!(grid.distance((0, y), (6, y)), 1.0);
        }
        assert_eq!(grid.distance((0, 0), (0, 3)), 1.0);
    }

    #[test]
    fn test_bounded_distance() {
        let grid = numbered(7, 4, Topology::Bounded);
        assert_eq!(grid.distance((0, 0), (6, 0)), 6.0);
        assert_eq!(grid.distance((0, 0), (3, 3)), 18.0f64.sqrt());
    }

    #[test]
    fn test_torus_index() {
        let torus = numbered(4, 3, Topology::Toroidal);
        assert_eq!(torus.torus_index(-1, 0), 3);
        assert_eq!(torus.torus_index(4, -1), 8);

        let bounded = numbered(4, 3, Topology::Bounded);
        assert_eq!(bounded.torus_index(-1, 0), 0);
        assert_eq!(bounded.torus_index(9, 9), 11);
    }

    #[test]
    fn test_bounded_region_is_clipped() {
        let grid = numbered(6, 6, Topology::Bounded);
        let region = grid.region((1, 5), 2, 2);
        assert_eq!(region, Region { x0: 0, y0: 3, width: 4, height: 3 });
    }

    #[test]
    fn test_toroidal_region_wraps() {
        let mut grid = numbered(6, 5, Topology::Toroidal);
        let region = grid.region((0, 4), 1, 1);
        assert_eq!(region, Region { x0: 5, y0: 3, width: 3, height: 3 });

        let cells = grid.region_cells_mut(&region);
        let positions: Vec<(usize, usize)> = cells.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(
            positions,
            vec![(5, 3), (0, 3), (1, 3), (5, 4), (0, 4), (1, 4), (5, 0), (0, 0), (1, 0)]
        );
        for cell in &cells {
            assert_eq!(*cell.vector, cell.y * 6 + cell.x);
        }
    }

    #[test]
    fn test_toroidal_region_never_repeats() {
        let mut grid = numbered(4, 4, Topology::Toroidal);
        let region = grid.region((1, 1), 3, 3);
        assert_eq!(region.len(), 16);

        let mut seen: Vec<usize> = grid.region_cells_mut(&region).iter().map(|c| *c.vector).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_neighbors() {
        let torus = numbered(4, 4, Topology::Toroidal);
        let mut out = Vec::new();
        torus.neighbors_into(0, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![1, 3, 4, 5, 7, 12, 13, 15]);

        let bounded = numbered(4, 4, Topology::Bounded);
        bounded.neighbors_into(0, &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![1, 4, 5]);
    }

    #[test]
    fn test_grow_layout() {
        let grid = Grid::from_fn(2, 2, Topology::Toroidal, |x, y| vec![(x * 10) as f64, (y * 10) as f64]);
        let grown = grid
            .grow(|a, b| a.iter().zip(b).map(|(p, q)| (p + q) / 2.0).collect())
            .unwrap();

        assert_eq!((grown.width(), grown.height()), (4, 4));
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(grown.reference(2 * x, 2 * y), grid.reference(x, y));
            }
        }
        // (1, 0) blended with its wrapped right neighbour (0, 0)
        assert_eq!(grown.reference(3, 0), &vec![5.0, 0.0]);
        assert_eq!(grown.reference(0, 1), &vec![0.0, 5.0]);
        assert_eq!(grown.reference(1, 1), &vec![5.0, 5.0]);
    }

    #[test]
    fn test_grow_rejects_bounded() {
        let grid = numbered(2, 2, Topology::Bounded);
        assert!(grid.grow(|a, _| *a).is_err());
    }
}
