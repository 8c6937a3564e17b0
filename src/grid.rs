//! The bounded/unbounded universe façade: owns the live-cell set, the
//! optional cached quadtree, and dispatches `step` to whichever algorithm is
//! selected (SPEC_FULL.md §4.5).

use crate::cancel::CancelToken;
use crate::cell::{Cell, CellSet};
use crate::quadtree::HashQuadtree;
use crate::rect::Rect;
use crate::sparse_life;

/// Which evolution algorithm `Grid::step` dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Algorithm {
    SparseLife,
    #[default]
    HashLife,
}

/// Axis for [`Grid::flip`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// A bounded or unbounded Game-of-Life universe.
///
/// `width == 0 && height == 0` means unbounded; any other combination is a
/// bounded grid whose live cells must all satisfy `0 <= x < width` and
/// `0 <= y < height`. The cell set is always authoritative; the quadtree is
/// a lazily rebuilt cache invalidated by `dirty`.
#[derive(Clone, Debug)]
pub struct Grid {
    width: i32,
    height: i32,
    algorithm: Algorithm,
    cells: CellSet,
    quadtree: Option<HashQuadtree>,
    dirty: bool,
    generation: i64,
    population: u64,
}

impl Grid {
    /// A fresh, empty grid. `(0, 0)` means unbounded.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            algorithm: Algorithm::default(),
            cells: CellSet::new(),
            quadtree: None,
            dirty: true,
            generation: 0,
            population: 0,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.width != 0 || self.height != 0
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn generation(&self) -> i64 {
        self.generation
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        // Live cells are unaffected; only which lazily-rebuilt cache gets
        // consulted next changes.
        self.algorithm = algorithm;
    }

    pub fn live_cells(&self) -> &CellSet {
        &self.cells
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        !self.is_bounded() || (x >= 0 && x < self.width && y >= 0 && y < self.height)
    }

    /// Toggles a single cell, returning whether it was in-bounds. Resets
    /// `generation` to 0 and invalidates the quadtree cache.
    pub fn set(&mut self, x: i32, y: i32, active: bool) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let cell = Cell::new(x, y);
        let changed = if active { self.cells.insert(cell) } else { self.cells.remove(&cell) };
        if changed {
            self.population = self.cells.len() as u64;
            self.generation = 0;
            self.dirty = true;
        }
        true
    }

    /// Advances `n` generations using the selected algorithm. Returns the
    /// number of generations actually applied, which is `< n` only on
    /// cancellation or generation-counter saturation.
    pub fn step(&mut self, n: i64, cancel: &CancelToken) -> i64 {
        if n <= 0 {
            return 0;
        }

        // HashLife has no notion of bounds (it advances an unbounded
        // quadtree); a bounded grid always steps through SparseLife
        // regardless of the selected algorithm, which only governs the
        // unbounded case. See `quadtree.rs`'s module doc.
        let applied = match (self.is_bounded(), self.algorithm) {
            (true, _) => self.step_sparse(n, cancel),
            (false, Algorithm::SparseLife) => self.step_sparse(n, cancel),
            (false, Algorithm::HashLife) => self.step_hash(n, cancel),
        };

        self.population = self.cells.len() as u64;
        self.generation = self.generation.saturating_add(applied);
        applied
    }

    fn step_sparse(&mut self, n: i64, cancel: &CancelToken) -> i64 {
        let bounds = self.bounds_rect();
        let mut applied = 0i64;
        for _ in 0..n {
            if cancel.is_cancelled() {
                break;
            }
            match sparse_life::step(&self.cells, bounds, cancel) {
                Some(next) => {
                    self.cells = next;
                    self.dirty = true;
                    applied += 1;
                }
                None => break,
            }
        }
        applied
    }

    fn step_hash(&mut self, n: i64, cancel: &CancelToken) -> i64 {
        let tree = *self.quadtree_mut();
        let (next_tree, applied) = tree.step(n, cancel);
        self.cells = next_tree.to_cell_set();
        self.quadtree = Some(next_tree);
        self.dirty = false;
        applied
    }

    fn bounds_rect(&self) -> Option<Rect> {
        if self.is_bounded() {
            Some(Rect::new(0, 0, self.width, self.height))
        } else {
            None
        }
    }

    /// Materialises the cached quadtree if absent or stale, and returns it.
    fn quadtree_mut(&mut self) -> &HashQuadtree {
        if self.dirty || self.quadtree.is_none() {
            self.quadtree = Some(HashQuadtree::from_cells(&self.cells, (0, 0)));
            self.dirty = false;
        }
        self.quadtree.as_ref().unwrap()
    }

    /// Resolves any lazy cache so a clone of this grid can be handed to
    /// another thread without racing the source's own cache rebuild
    /// (SPEC_FULL.md §5).
    pub fn prepare_copy(&mut self) {
        let _ = self.quadtree_mut();
    }

    /// A new, unbounded `Grid` containing the cells of `rect`, renumbered
    /// relative to the rect's own origin.
    pub fn sub_region(&self, rect: Rect) -> Grid {
        let mut out = Grid::new(0, 0);
        for cell in self.read_region(rect).iter() {
            out.set(cell.x - rect.x, cell.y - rect.y, true);
        }
        out
    }

    /// The live cells within `rect`, in this grid's own coordinate space.
    pub fn read_region(&self, rect: Rect) -> CellSet {
        self.cells.iter().filter(|c| rect.contains(c.x, c.y)).copied().collect()
    }

    pub fn clear_region(&mut self, rect: Rect) {
        let dead: Vec<Cell> = self.cells.iter().filter(|c| rect.contains(c.x, c.y)).copied().collect();
        for cell in dead {
            self.cells.remove(&cell);
        }
        self.population = self.cells.len() as u64;
        self.generation = 0;
        self.dirty = true;
    }

    /// Translates every live cell within `rect` by `(dx, dy)`. Cells that
    /// land out of bounds on a bounded grid are dropped.
    pub fn translate_region(&mut self, rect: Rect, dx: i32, dy: i32) {
        let moved: Vec<Cell> = self.cells.iter().filter(|c| rect.contains(c.x, c.y)).copied().collect();
        for cell in &moved {
            self.cells.remove(cell);
        }
        for cell in moved {
            let (nx, ny) = (cell.x + dx, cell.y + dy);
            if self.in_bounds(nx, ny) {
                self.cells.insert(Cell::new(nx, ny));
            }
        }
        self.population = self.cells.len() as u64;
        self.generation = 0;
        self.dirty = true;
    }

    /// Inserts `other`'s live cells at `pos`, returning the cells actually
    /// inserted (for undo logging). Cells landing out of bounds on a
    /// bounded grid are skipped.
    pub fn insert_grid(&mut self, other: &Grid, pos: (i32, i32)) -> CellSet {
        let mut inserted = CellSet::new();
        for cell in other.cells.iter() {
            let (x, y) = (cell.x + pos.0, cell.y + pos.1);
            if self.in_bounds(x, y) {
                let placed = Cell::new(x, y);
                self.cells.insert(placed);
                inserted.insert(placed);
            }
        }
        self.population = self.cells.len() as u64;
        self.generation = 0;
        self.dirty = true;
        inserted
    }

    /// Rotates the whole grid 90 degrees. Swaps width/height for a bounded,
    /// non-square grid.
    pub fn rotate(&mut self, clockwise: bool) {
        let (w, h) = (self.width, self.height);
        let rotated: CellSet = self
            .cells
            .iter()
            .map(|c| {
                if clockwise {
                    Cell::new(h - 1 - c.y, c.x)
                } else {
                    Cell::new(c.y, w - 1 - c.x)
                }
            })
            .collect();
        self.cells = rotated;
        if self.is_bounded() {
            std::mem::swap(&mut self.width, &mut self.height);
        }
        self.generation = 0;
        self.dirty = true;
    }

    /// Flips the grid in place across `axis`.
    pub fn flip(&mut self, axis: FlipAxis) {
        let (w, h) = (self.width, self.height);
        let flipped: CellSet = self
            .cells
            .iter()
            .map(|c| match axis {
                FlipAxis::Horizontal => Cell::new(w - 1 - c.x, c.y),
                FlipAxis::Vertical => Cell::new(c.x, h - 1 - c.y),
            })
            .collect();
        self.cells = flipped;
        self.generation = 0;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(coords: &[(i32, i32)]) -> Grid {
        let mut grid = Grid::new(0, 0);
        for &(x, y) in coords {
            grid.set(x, y, true);
        }
        grid
    }

    fn sorted(set: &CellSet) -> Vec<(i32, i32)> {
        let mut v: Vec<_> = set.iter().map(|c| (c.x, c.y)).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn population_tracks_live_cell_count() {
        let grid = seeded(&[(0, 0), (1, 1), (2, 2)]);
        assert_eq!(grid.population(), 3);
    }

    #[test]
    fn set_out_of_bounds_on_bounded_grid_fails() {
        let mut grid = Grid::new(4, 4);
        assert!(!grid.set(10, 10, true));
        assert_eq!(grid.population(), 0);
    }

    #[test]
    fn step_resets_to_toggle_but_not_to_step() {
        let mut grid = seeded(&[(0, 0), (0, 1), (0, 2)]);
        let cancel = CancelToken::new();
        grid.step(1, &cancel);
        assert_eq!(grid.generation(), 1);
        grid.set(5, 5, true);
        assert_eq!(grid.generation(), 0);
    }

    #[test]
    fn sparse_and_hash_agree_on_a_blinker() {
        let cancel = CancelToken::new();

        let mut sparse = seeded(&[(0, 0), (0, 1), (0, 2)]);
        sparse.set_algorithm(Algorithm::SparseLife);
        sparse.step(3, &cancel);

        let mut hashed = seeded(&[(0, 0), (0, 1), (0, 2)]);
        hashed.set_algorithm(Algorithm::HashLife);
        hashed.step(3, &cancel);

        assert_eq!(sorted(sparse.live_cells()), sorted(hashed.live_cells()));
    }

    #[test]
    fn algorithm_switch_preserves_live_cells() {
        let mut grid = seeded(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
        let before = sorted(grid.live_cells());
        grid.set_algorithm(Algorithm::HashLife);
        grid.prepare_copy();
        assert_eq!(sorted(grid.live_cells()), before);
    }

    #[test]
    fn translate_region_moves_cells_and_resets_generation() {
        let mut grid = seeded(&[(0, 0), (1, 0)]);
        grid.translate_region(Rect::new(0, 0, 2, 1), 5, 5);
        assert_eq!(sorted(grid.live_cells()), vec![(5, 5), (6, 5)]);
    }

    #[test]
    fn rotate_four_times_returns_to_original() {
        let mut grid = Grid::new(4, 4);
        grid.set(0, 0, true);
        grid.set(1, 0, true);
        let before = sorted(grid.live_cells());
        for _ in 0..4 {
            grid.rotate(true);
        }
        assert_eq!(sorted(grid.live_cells()), before);
        assert_eq!(grid.width(), 4);
        assert_eq!(grid.height(), 4);
    }

    #[test]
    fn flip_twice_returns_to_original() {
        let mut grid = Grid::new(4, 4);
        grid.set(0, 0, true);
        grid.set(3, 3, true);
        let before = sorted(grid.live_cells());
        grid.flip(FlipAxis::Horizontal);
        grid.flip(FlipAxis::Horizontal);
        assert_eq!(sorted(grid.live_cells()), before);
    }

    #[test]
    fn insert_grid_reports_only_cells_actually_placed() {
        let mut base = Grid::new(4, 4);
        let mut stamp = Grid::new(0, 0);
        stamp.set(0, 0, true);
        stamp.set(10, 10, true);
        let inserted = base.insert_grid(&stamp, (0, 0));
        assert_eq!(inserted.len(), 1);
        assert!(base.live_cells().contains(&Cell::new(0, 0)));
    }

    #[test]
    fn bounded_grid_clips_births_even_under_hashlife_selector() {
        let cancel = CancelToken::new();
        let mut grid = Grid::new(4, 4);
        grid.set_algorithm(Algorithm::HashLife);
        grid.set(0, 0, true);
        grid.set(1, 0, true);
        grid.set(0, 1, true);
        grid.step(1, &cancel);
        for cell in grid.live_cells().iter() {
            assert!(cell.x >= 0 && cell.x < 4 && cell.y >= 0 && cell.y < 4);
        }
    }

    #[test]
    fn sub_region_renumbers_relative_to_its_origin() {
        let grid = seeded(&[(5, 5), (6, 5)]);
        let sub = grid.sub_region(Rect::new(5, 5, 2, 1));
        assert_eq!(sorted(sub.live_cells()), vec![(0, 0), (1, 0)]);
    }
}
