//! Gosper's HashLife over the hash-consed node pool in [`crate::pool`].
//!
//! A [`HashQuadtree`] is a root handle plus the world-space offset of its
//! NW corner. The pool (and its step caches) live for the whole process, so
//! structurally identical subtrees are shared across every quadtree and
//! every thread — this module only ever asks the pool to intern nodes,
//! never owns a node directly.
//!
//! HashLife is specified for the unbounded universe; a bounded `Grid`
//! dispatches to `SparseLife` instead (see `grid.rs`), so no quadtree
//! function here takes a bounds argument.

use crate::cancel::CancelToken;
use crate::cell::{Cell, CellSet};
use crate::node::NodeRef;
use crate::pool::{NodePool, pool};
use crate::rect::Rect;
use crate::sparse_life;

use std::cmp::max;
use thunderdome::Index;

/// Above this depth, `i64` arithmetic on root offsets during expansion
/// could overflow; advancing stops and reports zero generations instead
/// (kept one below the 63 the spec's overflow guard documents, so the
/// subsequent offset shift never itself overflows).
const MAX_DEPTH: u8 = 62;

/// A quadtree snapshot of a live-cell set: a root node handle (or the empty
/// sentinel) plus the world coordinate of the root's NW corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashQuadtree {
    root: NodeRef,
    offset_x: i64,
    offset_y: i64,
    level: u8,
}

impl HashQuadtree {
    /// The empty quadtree: no live cells, root is `FALSE_NODE`.
    pub fn empty() -> Self {
        Self { root: None, offset_x: 0, offset_y: 0, level: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Side length of the square this tree's root covers (0 for an empty tree).
    pub fn size(&self) -> i64 {
        if self.root.is_none() { 0 } else { 1i64 << self.level }
    }

    pub fn offset(&self) -> (i64, i64) {
        (self.offset_x, self.offset_y)
    }

    pub fn population(&self) -> u64 {
        pool().lock().unwrap().population_of(self.root)
    }

    /// Builds a quadtree from an explicit cell set, per SPEC_FULL.md §4.3.
    /// `offset` is added to every cell coordinate before construction, so a
    /// caller can build a tree for a sub-region without first renumbering
    /// its cells.
    pub fn from_cells(cells: &CellSet, offset: (i64, i64)) -> Self {
        if cells.is_empty() {
            return Self::empty();
        }

        let (min_x, min_y, max_x, max_y) = cells.bounds().expect("non-empty cell set has bounds");
        let span = max(max_x - min_x, max_y - min_y) as i64 + 1;
        let size = next_power_of_two(span);
        let level = size.trailing_zeros() as u8;

        let mut points: Vec<(i64, i64)> = cells
            .iter()
            .map(|c| ((c.x - min_x) as i64, (c.y - min_y) as i64))
            .collect();
        points.sort_unstable();

        let mut guard = pool().lock().unwrap();
        let root = build_node(&mut guard, &points, size, 0, 0);
        drop(guard);

        Self {
            root,
            offset_x: min_x as i64 + offset.0,
            offset_y: min_y as i64 + offset.1,
            level,
        }
    }

    /// Depth-first traversal yielding every live cell exactly once, in NW,
    /// NE, SW, SE quadrant order. A fresh iterator is produced on each
    /// call, so traversal is always restartable from the beginning.
    pub fn iter(&self) -> QuadtreeIter {
        let mut stack = Vec::new();
        if self.root.is_some() {
            stack.push(Frame { node: self.root, x: self.offset_x, y: self.offset_y, size: self.size() });
        }
        QuadtreeIter { stack }
    }

    /// Converts this quadtree back into a plain [`CellSet`].
    pub fn to_cell_set(&self) -> CellSet {
        self.iter().map(|(x, y)| Cell::new(x as i32, y as i32)).collect()
    }

    /// Advances the universe by exactly `num_steps` generations, returning
    /// the new tree and the number of generations actually applied (always
    /// `num_steps` unless cancelled or a depth-overflow guard trips, in
    /// which case it is the largest prefix completed).
    pub fn step(&self, num_steps: i64, cancel: &CancelToken) -> (HashQuadtree, i64) {
        if num_steps <= 0 || self.root.is_none() {
            return (*self, 0);
        }

        let max_advance = max_advance_of(num_steps);
        let mut tree = *self;
        let mut done = 0i64;

        while done < num_steps {
            if cancel.is_cancelled() {
                break;
            }
            let (next, contributed) = tree.next_generation(max_advance);
            if contributed == 0 {
                break;
            }
            tree = next;
            done += contributed;
        }

        (tree, done)
    }

    /// One call to Gosper's `NextGeneration`: expands the universe as
    /// needed, advances the root, and returns the centered, half-sized
    /// result plus the number of generations it represents.
    fn next_generation(&self, max_advance: i64) -> (HashQuadtree, i64) {
        if self.root.is_none() {
            return (*self, 0);
        }

        let mut tree = *self;
        while needs_expansion(&tree) {
            if tree.level >= MAX_DEPTH {
                return (tree, 0);
            }
            tree = tree.expand();
        }

        let mut guard = pool().lock().unwrap();
        let (result, generations) = advance(&mut guard, tree.root.unwrap(), max_advance);
        drop(guard);

        let shift = 1i64 << (tree.level - 2);
        let new_tree = HashQuadtree {
            root: result,
            offset_x: tree.offset_x + shift,
            offset_y: tree.offset_y + shift,
            level: tree.level - 1,
        };
        (new_tree, generations)
    }

    /// Wraps the root in an empty border on all four sides, growing the
    /// tree by one level and shifting the offset by half the
    /// pre-expansion size so the tree still names the same world-space
    /// square (now centered one quadrant in from each edge).
    fn expand(&self) -> HashQuadtree {
        debug_assert!(self.level >= 1);
        let mut guard = pool().lock().unwrap();
        let root = self.root.expect("expand called on empty tree");
        let (nw, ne, sw, se) = guard
            .children_of(Some(root))
            .expect("every non-empty node at level >= 1 is a branch");

        let empty = guard.empty_tree(self.level - 1);
        let new_level = self.level + 1;

        let new_nw = guard.find_or_create(empty, empty, empty, nw, self.level);
        let new_ne = guard.find_or_create(empty, empty, ne, empty, self.level);
        let new_sw = guard.find_or_create(empty, sw, empty, empty, self.level);
        let new_se = guard.find_or_create(se, empty, empty, empty, self.level);
        let new_root = guard.find_or_create(new_nw, new_ne, new_sw, new_se, new_level);

        let shift = 1i64 << (self.level - 1);
        HashQuadtree {
            root: new_root,
            offset_x: self.offset_x - shift,
            offset_y: self.offset_y - shift,
            level: new_level,
        }
    }
}

struct Frame {
    node: NodeRef,
    x: i64,
    y: i64,
    size: i64,
}

/// Restartable depth-first iterator over the live cells of a [`HashQuadtree`].
pub struct QuadtreeIter {
    stack: Vec<Frame>,
}

impl Iterator for QuadtreeIter {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.pop()?;
            let guard = pool().lock().unwrap();
            if guard.is_empty_node(frame.node) {
                continue;
            }
            if guard.is_true_leaf(frame.node) {
                return Some((frame.x, frame.y));
            }
            let Some((nw, ne, sw, se)) = guard.children_of(frame.node) else {
                continue;
            };
            drop(guard);
            let half = frame.size / 2;
            // Pushed in reverse so NW pops first (the stack is LIFO).
            self.stack.push(Frame { node: se, x: frame.x + half, y: frame.y + half, size: half });
            self.stack.push(Frame { node: sw, x: frame.x, y: frame.y + half, size: half });
            self.stack.push(Frame { node: ne, x: frame.x + half, y: frame.y, size: half });
            self.stack.push(Frame { node: nw, x: frame.x, y: frame.y, size: half });
        }
    }
}

/// Largest power of two dividing `num_steps`, clamped so an odd
/// `num_steps` advances by exactly 1 rather than underflowing (see
/// SPEC_FULL.md §9 on `MaxAdvanceOf`).
pub fn max_advance_of(num_steps: i64) -> i64 {
    if num_steps <= 0 {
        return 0;
    }
    num_steps & num_steps.wrapping_neg()
}

fn next_power_of_two(n: i64) -> i64 {
    let mut size = 2i64;
    while size < n {
        size <<= 1;
    }
    size
}

/// Recursively partitions `points` (already sorted and relative to the
/// region's own origin) by the horizontal/vertical midlines, building a
/// hash-consed node bottom-up.
fn build_node(guard: &mut NodePool, points: &[(i64, i64)], size: i64, ox: i64, oy: i64) -> NodeRef {
    if points.is_empty() {
        return guard.empty_tree(size.trailing_zeros() as u8);
    }
    if size == 1 {
        return guard.true_node();
    }

    let half = size / 2;
    let mid_x = ox + half;
    let mid_y = oy + half;

    let mut nw = Vec::new();
    let mut ne = Vec::new();
    let mut sw = Vec::new();
    let mut se = Vec::new();
    for &(x, y) in points {
        match (x < mid_x, y < mid_y) {
            (true, true) => nw.push((x, y)),
            (false, true) => ne.push((x, y)),
            (true, false) => sw.push((x, y)),
            (false, false) => se.push((x, y)),
        }
    }

    let level = size.trailing_zeros() as u8;
    let nw_node = build_node(guard, &nw, half, ox, oy);
    let ne_node = build_node(guard, &ne, half, mid_x, oy);
    let sw_node = build_node(guard, &sw, half, ox, mid_y);
    let se_node = build_node(guard, &se, half, mid_x, mid_y);
    guard.find_or_create(nw_node, ne_node, sw_node, se_node, level)
}

/// Collects every live leaf under `node` (a square of `size` at local
/// coordinates `(x, y)..(x+size, y+size)`) into `out`.
fn collect_cells(guard: &NodePool, node: NodeRef, x: i32, y: i32, size: i32, out: &mut CellSet) {
    if guard.is_empty_node(node) {
        return;
    }
    if size == 1 {
        if guard.is_true_leaf(node) {
            out.insert(Cell::new(x, y));
        }
        return;
    }
    if let Some((nw, ne, sw, se)) = guard.children_of(node) {
        let half = size / 2;
        collect_cells(guard, nw, x, y, half, out);
        collect_cells(guard, ne, x + half, y, half, out);
        collect_cells(guard, sw, x, y + half, half, out);
        collect_cells(guard, se, x + half, y + half, half, out);
    }
}

fn make_leaf(guard: &mut NodePool, nw: bool, ne: bool, sw: bool, se: bool) -> NodeRef {
    let t = guard.true_node();
    let f = guard.false_node();
    let pick = |alive: bool| if alive { t } else { f };
    guard.find_or_create(pick(nw), pick(ne), pick(sw), pick(se), 1)
}

/// True when any live cell lies within one quadrant's thickness of the
/// root's perimeter, i.e. population is not entirely contained in the four
/// inner quadrants of the root's children. This single margin is exact for
/// every `max_advance` up to and including the node's own natural amount,
/// not just for a full natural jump: [`slow_case`] never materialises and
/// crops a region, it recurses through the same overlapping nine-window
/// decomposition [`recursive_case`] uses, just once instead of twice, so
/// the margin that keeps the fast path exact keeps the throttled path exact
/// too.
fn needs_expansion(tree: &HashQuadtree) -> bool {
    let Some(root) = tree.root else { return false };
    if tree.level < 2 {
        return true;
    }
    let guard = pool().lock().unwrap();
    let Some((nw, ne, sw, se)) = guard.children_of(Some(root)) else {
        return true;
    };
    let inner = inner_population(&guard, nw, 3)
        + inner_population(&guard, ne, 2)
        + inner_population(&guard, sw, 1)
        + inner_population(&guard, se, 0);
    inner != guard.population_of(Some(root))
}

/// Population of quadrant `which` (0=nw, 1=ne, 2=sw, 3=se) of `node`'s children.
fn inner_population(guard: &NodePool, node: NodeRef, which: u8) -> u64 {
    match guard.children_of(node) {
        Some((nw, ne, sw, se)) => match which {
            0 => guard.population_of(nw),
            1 => guard.population_of(ne),
            2 => guard.population_of(sw),
            _ => guard.population_of(se),
        },
        None => 0,
    }
}

/// Advances `node` (at `level >= 2`) by the throttled amount, capped at
/// `max_advance` generations. Returns the centered, half-sized result and
/// the number of generations it actually represents: the full natural
/// jump `2^(level-2)` when `max_advance` allows it (memoised on the node
/// itself via [`advance_natural`]), otherwise a slower direct simulation
/// capped at exactly `max_advance` (memoised in the pool's side table,
/// keyed on `(node, max_advance)`).
fn advance(guard: &mut NodePool, node: Index, max_advance: i64) -> (NodeRef, i64) {
    let level = guard.level_of(Some(node));
    debug_assert!(level >= 2);
    let natural = 1i64 << (level - 2);

    if natural <= max_advance {
        return (advance_natural(guard, Some(node), level), natural);
    }

    if let Some(cached) = guard.slow_advance_cached(Some(node), max_advance) {
        return (cached, max_advance);
    }
    let result = slow_case(guard, Some(node), level, max_advance);
    guard.store_slow_advance(Some(node), max_advance, result);
    (result, max_advance)
}

/// The node's full, unthrottled `2^(level-2)`-generation advance. This is
/// the quantity the fast-path `OnceLock` on each node memoises; every
/// recursive call inside [`recursive_case`] wants exactly this, never a
/// throttled amount, since throttling only ever applies at the outermost
/// call a caller makes.
fn advance_natural(guard: &mut NodePool, node: NodeRef, level: u8) -> NodeRef {
    let idx = node.expect("combine always interns a concrete node, never FALSE_NODE itself");
    if let Some(cached) = guard.fast_advance_cached(idx) {
        return cached;
    }
    if guard.is_empty_node(Some(idx)) {
        let empty = guard.empty_tree(level - 1);
        return guard.store_fast_advance(idx, empty);
    }
    let result = if level == 2 { base_case(guard, idx) } else { recursive_case(guard, idx, level) };
    guard.store_fast_advance(idx, result)
}

/// Base case: a level-2 (4x4) node's result is its center 2x2 advanced one
/// generation via SparseLife (SPEC_FULL.md §4.4).
fn base_case(guard: &mut NodePool, node: Index) -> NodeRef {
    let mut cells = CellSet::new();
    collect_cells(guard, Some(node), 0, 0, 4, &mut cells);
    let next = sparse_life::step_bounded(&cells, Rect::new(0, 0, 4, 4));
    let live = |x: i32, y: i32| next.contains(&Cell::new(x, y));
    make_leaf(guard, live(1, 1), live(2, 1), live(1, 2), live(2, 2))
}

/// Recursive case (level >= 3): forms the nine overlapping sub-squares of
/// the input's children, advances each by its own natural amount, combines
/// those into four overlapping quadrants one level up, advances those too,
/// and joins the final four results — the standard two-pass Gosper
/// decomposition (SPEC_FULL.md §4.4).
fn recursive_case(guard: &mut NodePool, node: Index, level: u8) -> NodeRef {
    let (nw, ne, sw, se) = guard.children_of(Some(node)).expect("branch node has children");
    let child_level = level - 1;

    let n01 = centered_horizontal(guard, nw, ne, child_level);
    let n10 = centered_vertical(guard, nw, sw, child_level);
    let n12 = centered_vertical(guard, ne, se, child_level);
    let n21 = centered_horizontal(guard, sw, se, child_level);
    let n11 = centered_sub_node(guard, nw, ne, sw, se, child_level);

    let r00 = advance_natural(guard, nw, child_level);
    let r01 = advance_natural(guard, n01, child_level);
    let r02 = advance_natural(guard, ne, child_level);
    let r10 = advance_natural(guard, n10, child_level);
    let r11 = advance_natural(guard, n11, child_level);
    let r12 = advance_natural(guard, n12, child_level);
    let r20 = advance_natural(guard, sw, child_level);
    let r21 = advance_natural(guard, n21, child_level);
    let r22 = advance_natural(guard, se, child_level);

    let q_nw = guard.find_or_create(r00, r01, r10, r11, child_level);
    let q_ne = guard.find_or_create(r01, r02, r11, r12, child_level);
    let q_sw = guard.find_or_create(r10, r11, r20, r21, child_level);
    let q_se = guard.find_or_create(r11, r12, r21, r22, child_level);

    let f_nw = advance_natural(guard, q_nw, child_level);
    let f_ne = advance_natural(guard, q_ne, child_level);
    let f_sw = advance_natural(guard, q_sw, child_level);
    let f_se = advance_natural(guard, q_se, child_level);

    guard.find_or_create(f_nw, f_ne, f_sw, f_se, child_level)
}

/// The slow/throttled path (SPEC_FULL.md §4.4): mirrors [`recursive_case`]'s
/// nine-window decomposition, but advances each window by exactly
/// `max_advance` generations (rather than its own natural amount) and folds
/// the four overlapping quadrants straight down into the final node with a
/// single structural recombination — there is no second advance pass,
/// because `max_advance` generations are already fully accounted for while
/// the windows themselves were advanced.
///
/// A tempting-looking alternative is to materialise the node's own
/// `2^level` square, run `max_advance` plain generations over it, and crop
/// the centered half back out. That is unsound: a live cell sitting on the
/// inner edge of the kept half can cross out of it within `max_advance`
/// generations, and a crop has nowhere to put a cell that migrated outside
/// its window — the cell is simply gone from the result. Recursing through
/// the overlapping windows instead never needs to discard anything; each
/// window's own advance is exact on its own terms, the same way
/// `recursive_case`'s first pass is.
fn slow_case(guard: &mut NodePool, node: NodeRef, level: u8, max_advance: i64) -> NodeRef {
    debug_assert!(level >= 3, "level 2's natural advance is always 1, so it always takes the fast path");
    let (nw, ne, sw, se) = guard.children_of(node).expect("branch node has children");
    let child_level = level - 1;

    let n01 = centered_horizontal(guard, nw, ne, child_level);
    let n10 = centered_vertical(guard, nw, sw, child_level);
    let n12 = centered_vertical(guard, ne, se, child_level);
    let n21 = centered_horizontal(guard, sw, se, child_level);
    let n11 = centered_sub_node(guard, nw, ne, sw, se, child_level);

    let r00 = advance_window(guard, nw, child_level, max_advance);
    let r01 = advance_window(guard, n01, child_level, max_advance);
    let r02 = advance_window(guard, ne, child_level, max_advance);
    let r10 = advance_window(guard, n10, child_level, max_advance);
    let r11 = advance_window(guard, n11, child_level, max_advance);
    let r12 = advance_window(guard, n12, child_level, max_advance);
    let r20 = advance_window(guard, sw, child_level, max_advance);
    let r21 = advance_window(guard, n21, child_level, max_advance);
    let r22 = advance_window(guard, se, child_level, max_advance);

    let result_level = child_level - 1;
    let c_nw = centered_sub_node(guard, r00, r01, r10, r11, result_level);
    let c_ne = centered_sub_node(guard, r01, r02, r11, r12, result_level);
    let c_sw = centered_sub_node(guard, r10, r11, r20, r21, result_level);
    let c_se = centered_sub_node(guard, r11, r12, r21, r22, result_level);

    guard.find_or_create(c_nw, c_ne, c_sw, c_se, child_level)
}

/// Advances one of [`slow_case`]'s nine windows (`level` is the window's own
/// level) by exactly `max_advance` generations, short-circuiting dead
/// windows without recursing into them.
fn advance_window(guard: &mut NodePool, window: NodeRef, level: u8, max_advance: i64) -> NodeRef {
    match window {
        None => guard.empty_tree(level - 1),
        Some(idx) => {
            if guard.is_empty_node(Some(idx)) {
                guard.empty_tree(level - 1)
            } else {
                advance(guard, idx, max_advance).0
            }
        }
    }
}

/// The horizontal strip centered between `west` and `east`: their NE/SE
/// and NW/SW quadrants respectively, forming a node at `level` (the same
/// level as `west` and `east` themselves).
fn centered_horizontal(guard: &mut NodePool, west: NodeRef, east: NodeRef, level: u8) -> NodeRef {
    let (_, w_ne, _, w_se) = guard.children_of(west).unwrap_or((None, None, None, None));
    let (e_nw, _, e_sw, _) = guard.children_of(east).unwrap_or((None, None, None, None));
    guard.find_or_create(w_ne, e_nw, w_se, e_sw, level)
}

/// The vertical strip centered between `north` and `south`.
fn centered_vertical(guard: &mut NodePool, north: NodeRef, south: NodeRef, level: u8) -> NodeRef {
    let (_, _, n_sw, n_se) = guard.children_of(north).unwrap_or((None, None, None, None));
    let (s_nw, s_ne, _, _) = guard.children_of(south).unwrap_or((None, None, None, None));
    guard.find_or_create(n_sw, n_se, s_nw, s_ne, level)
}

/// The dead-center sub-node formed from the innermost corner of each of the
/// four children.
fn centered_sub_node(guard: &mut NodePool, nw: NodeRef, ne: NodeRef, sw: NodeRef, se: NodeRef, level: u8) -> NodeRef {
    let nw_se = guard.children_of(nw).map(|(_, _, _, se)| se).unwrap_or(None);
    let ne_sw = guard.children_of(ne).map(|(_, _, sw, _)| sw).unwrap_or(None);
    let sw_ne = guard.children_of(sw).map(|(_, ne, _, _)| ne).unwrap_or(None);
    let se_nw = guard.children_of(se).map(|(nw, _, _, _)| nw).unwrap_or(None);
    guard.find_or_create(nw_se, ne_sw, sw_ne, se_nw, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(coords: &[(i32, i32)]) -> CellSet {
        coords.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    fn sorted(tree: &HashQuadtree) -> Vec<(i64, i64)> {
        let mut v: Vec<_> = tree.iter().collect();
        v.sort_unstable();
        v
    }

    fn sorted_set(set: &CellSet) -> Vec<(i64, i64)> {
        let mut v: Vec<_> = set.iter().map(|c| (c.x as i64, c.y as i64)).collect();
        v.sort_unstable();
        v
    }

    #[test]
    fn from_cells_round_trips_through_iter() {
        let set = cells(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
        let tree = HashQuadtree::from_cells(&set, (0, 0));
        assert_eq!(sorted(&tree), sorted_set(&set));
    }

    #[test]
    fn empty_cell_set_yields_empty_tree() {
        let tree = HashQuadtree::from_cells(&CellSet::new(), (0, 0));
        assert!(tree.is_empty());
        assert_eq!(tree.iter().count(), 0);
    }

    #[test]
    fn structural_sharing_for_identical_patterns() {
        let a = HashQuadtree::from_cells(&cells(&[(0, 0), (1, 1)]), (0, 0));
        let b = HashQuadtree::from_cells(&cells(&[(1, 1), (0, 0)]), (0, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn blinker_has_period_two_under_hashlife() {
        let set = cells(&[(0, 0), (0, 1), (0, 2)]);
        let tree = HashQuadtree::from_cells(&set, (-8, -8));
        let before = sorted(&tree);
        let cancel = CancelToken::new();
        let (after_two, done) = tree.step(2, &cancel);
        assert_eq!(done, 2);
        assert_eq!(sorted(&after_two), before);
    }

    #[test]
    fn blinker_one_step_matches_sparse_life() {
        let set = cells(&[(0, 0), (0, 1), (0, 2)]);
        let tree = HashQuadtree::from_cells(&set, (-8, -8));
        let cancel = CancelToken::new();
        let (after, done) = tree.step(1, &cancel);
        assert_eq!(done, 1);
        // The blinker lives at absolute (-8,-8)..(-8,-6); after one
        // generation it flips to the horizontal phase one row south.
        assert_eq!(sorted(&after), vec![(-9, -7), (-8, -7), (-7, -7)]);
    }

    #[test]
    fn block_is_stable_under_hashlife() {
        let set = cells(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
        let tree = HashQuadtree::from_cells(&set, (-8, -8));
        let before = sorted(&tree);
        let cancel = CancelToken::new();
        let (after, done) = tree.step(5, &cancel);
        assert_eq!(done, 5);
        assert_eq!(sorted(&after), before);
    }

    #[test]
    fn heat_death_of_single_cell() {
        let set = cells(&[(42, 42)]);
        let tree = HashQuadtree::from_cells(&set, (0, 0));
        let cancel = CancelToken::new();
        let (after, done) = tree.step(1, &cancel);
        assert_eq!(done, 1);
        assert_eq!(after.iter().count(), 0);
    }

    #[test]
    fn glider_translates_after_four_generations() {
        let set = cells(&[(1, 0), (2, 1), (0, 2), (1, 2), (2, 2)]);
        let tree = HashQuadtree::from_cells(&set, (-16, -16));
        let cancel = CancelToken::new();
        let (after, done) = tree.step(4, &cancel);
        assert_eq!(done, 4);
        let result = sorted(&after);
        assert_eq!(result.len(), 5);
        let expected: Vec<(i64, i64)> = {
            // The seed was placed at absolute offset (-16,-16); the glider
            // translates by (+1,+1) every four generations wherever it sits.
            let mut v: Vec<_> = set.iter().map(|c| (c.x as i64 - 15, c.y as i64 - 15)).collect();
            v.sort_unstable();
            v
        };
        assert_eq!(result, expected);
    }

    #[test]
    fn odd_step_count_uses_throttled_slow_path() {
        let set = cells(&[(0, 0), (0, 1), (0, 2)]);
        let tree = HashQuadtree::from_cells(&set, (-8, -8));
        let cancel = CancelToken::new();
        let (after, done) = tree.step(3, &cancel);
        assert_eq!(done, 3);
        // Period 2: 3 steps lands back on the rotated phase (1 step's worth).
        assert_eq!(sorted(&after), vec![(-9, -7), (-8, -7), (-7, -7)]);
    }

    #[test]
    fn max_advance_of_matches_clamped_semantics() {
        assert_eq!(max_advance_of(0), 0);
        assert_eq!(max_advance_of(1), 1);
        assert_eq!(max_advance_of(3), 1);
        assert_eq!(max_advance_of(8), 8);
        assert_eq!(max_advance_of(12), 4);
    }
}
