//! SparseLife: a single-threaded, neighbor-counting Conway's Life evolution
//! over a [`CellSet`], used both as `Grid`'s small/bounded algorithm and as
//! the HashLife base case's ground truth (SPEC_FULL.md §4.1).
//!
//! Deliberately not parallelised with `rayon`: the per-generation neighbor
//! tally below is already a single pass over a handful of live cells in the
//! common case, and cancellation is checked once per cell rather than once
//! per chunk, which only a single-threaded loop can do without extra
//! synchronisation.

use crate::cancel::CancelToken;
use crate::cell::{Cell, CellSet};
use crate::rect::Rect;
use rustc_hash::FxHashMap;

const NEIGHBOR_OFFSETS: [(i32, i32); 8] =
    [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];

/// Advances `cells` by one generation under Conway's B3/S23 rule, with no
/// bound on the universe and no cancellation support. Used internally by
/// [`step`] and by the HashLife base case, where the caller has already
/// established the relevant bounds (or deliberately wants none).
pub fn step_unbounded(cells: &CellSet) -> CellSet {
    let mut neighbor_counts: FxHashMap<Cell, u8> = FxHashMap::default();
    for cell in cells.iter() {
        neighbor_counts.entry(*cell).or_insert(0);
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let neighbor = Cell::new(cell.x.wrapping_add(dx), cell.y.wrapping_add(dy));
            *neighbor_counts.entry(neighbor).or_insert(0) += 1;
        }
    }

    let mut next = CellSet::with_capacity(neighbor_counts.len());
    for (cell, count) in neighbor_counts {
        let alive = cells.contains(&cell);
        let survives = alive && (count == 2 || count == 3);
        let born = !alive && count == 3;
        if survives || born {
            next.insert(cell);
        }
    }
    next
}

/// Advances `cells` by one generation, discarding any cell (live or newly
/// born) that falls outside `bounds`. Cells outside `bounds` still
/// contribute as neighbors to cells inside it, since a bounded grid still
/// has real dead space past its edge — only the *result* is clipped.
pub fn step_bounded(cells: &CellSet, bounds: Rect) -> CellSet {
    let next = step_unbounded(cells);
    if bounds.is_empty() {
        return next;
    }
    next.iter()
        .filter(|c| bounds.contains(c.x, c.y))
        .copied()
        .collect()
}

/// Advances `cells` by exactly one generation, honoring cancellation and an
/// optional bounding rectangle (SPEC_FULL.md §4.1). Checked once per live
/// cell (plus its neighbors), not once per generation, so a caller that
/// cancels mid-step still gets a prompt response on a large pattern.
///
/// Returns `None` if `cancel` is observed set before the generation
/// completes; in that case the caller's prior state is left untouched.
pub fn step(cells: &CellSet, bounds: Option<Rect>, cancel: &CancelToken) -> Option<CellSet> {
    let mut neighbor_counts: FxHashMap<Cell, u8> = FxHashMap::default();
    for cell in cells.iter() {
        if cancel.is_cancelled() {
            return None;
        }
        neighbor_counts.entry(*cell).or_insert(0);
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let neighbor = Cell::new(cell.x.wrapping_add(dx), cell.y.wrapping_add(dy));
            *neighbor_counts.entry(neighbor).or_insert(0) += 1;
        }
    }

    if cancel.is_cancelled() {
        return None;
    }

    let mut next = CellSet::with_capacity(neighbor_counts.len());
    for (cell, count) in neighbor_counts {
        if let Some(rect) = bounds {
            if !rect.contains(cell.x, cell.y) {
                continue;
            }
        }
        let alive = cells.contains(&cell);
        let survives = alive && (count == 2 || count == 3);
        let born = !alive && count == 3;
        if survives || born {
            next.insert(cell);
        }
    }
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(coords: &[(i32, i32)]) -> CellSet {
        coords.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    fn sorted(set: &CellSet) -> Vec<(i32, i32)> {
        let mut v: Vec<_> = set.iter().map(|c| (c.x, c.y)).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn blinker_rotates_every_generation() {
        let vertical = cells(&[(1, 0), (1, 1), (1, 2)]);
        let horizontal = step_unbounded(&vertical);
        assert_eq!(sorted(&horizontal), vec![(0, 1), (1, 1), (2, 1)]);
        let back = step_unbounded(&horizontal);
        assert_eq!(sorted(&back), sorted(&vertical));
    }

    #[test]
    fn block_is_still_life() {
        let block = cells(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
        let next = step_unbounded(&block);
        assert_eq!(sorted(&next), sorted(&block));
    }

    #[test]
    fn lone_cell_dies_of_underpopulation() {
        let lone = cells(&[(5, 5)]);
        let next = step_unbounded(&lone);
        assert!(next.is_empty());
    }

    #[test]
    fn step_bounded_clips_births_at_the_edge() {
        let corner = cells(&[(0, 0), (1, 0), (0, 1)]);
        let bounds = Rect::new(0, 0, 2, 2);
        let next = step_bounded(&corner, bounds);
        for c in next.iter() {
            assert!(bounds.contains(c.x, c.y));
        }
    }

    #[test]
    fn step_returns_none_when_cancelled_up_front() {
        let glider = cells(&[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(step(&glider, None, &cancel).is_none());
    }

    #[test]
    fn step_matches_unbounded_when_not_cancelled() {
        let glider = cells(&[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
        let cancel = CancelToken::new();
        let stepped = step(&glider, None, &cancel).unwrap();
        assert_eq!(sorted(&stepped), sorted(&step_unbounded(&glider)));
    }
}
