use crate::node::{LifeNode, NodeRef, mix_children};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, OnceLock};
use thunderdome::{Arena, Index};

type ChildKey = (NodeRef, NodeRef, NodeRef, NodeRef);

/// The process-wide hash-consed quadtree node store.
///
/// Append-only for the lifetime of a normal run: `find_or_create` either
/// returns an existing handle or allocates a new immutable node. Nodes are
/// never mutated after insertion; the only thing that ever changes about a
/// node post-publication is its `fast_advance` memo cell, which is itself
/// written at most once (`OnceLock`).
pub struct NodePool {
    arena: Arena<LifeNode>,
    interning: FxHashMap<ChildKey, Index>,
    true_node: Index,
    /// `empty_cache[k]` is the materialised, interned all-dead branch node
    /// at level `k` (for `k >= 1`). Level 0 emptiness is `FALSE_NODE`
    /// (`None`) and needs no cache entry.
    empty_cache: Vec<NodeRef>,
    /// `(node, max_advance) -> advanced node`, the slow-path memo table.
    /// The fast path is memoised on the node itself (see `node::LifeNode`).
    slow_cache: FxHashMap<(NodeRef, i64), NodeRef>,
}

impl NodePool {
    fn new() -> Self {
        let mut arena = Arena::new();
        let hash = mix_children(None, None, None, None) ^ 0x1;
        let true_node = arena.insert(LifeNode::leaf_true(hash));
        Self {
            arena,
            interning: FxHashMap::default(),
            true_node,
            empty_cache: Vec::new(),
            slow_cache: FxHashMap::default(),
        }
    }

    pub fn true_node(&self) -> NodeRef {
        Some(self.true_node)
    }

    pub fn false_node(&self) -> NodeRef {
        None
    }

    pub fn get(&self, idx: Index) -> &LifeNode {
        self.arena
            .get(idx)
            .expect("node pool handle outlived its arena slot")
    }

    pub fn level_of(&self, node: NodeRef) -> u8 {
        match node {
            None => 0,
            Some(idx) => self.get(idx).level,
        }
    }

    pub fn population_of(&self, node: NodeRef) -> u64 {
        match node {
            None => 0,
            Some(idx) => self.get(idx).population,
        }
    }

    pub fn is_empty_node(&self, node: NodeRef) -> bool {
        match node {
            None => true,
            Some(idx) => self.get(idx).is_empty,
        }
    }

    pub fn is_true_leaf(&self, node: NodeRef) -> bool {
        node == Some(self.true_node)
    }

    /// Children of a branch node. `None` for a leaf (level 0) or `FALSE_NODE`.
    pub fn children_of(&self, node: NodeRef) -> Option<(NodeRef, NodeRef, NodeRef, NodeRef)> {
        match node {
            None => None,
            Some(idx) => self.get(idx).children(),
        }
    }

    /// Interns a branch of the four given children at `level`, returning the
    /// canonical handle for that exact combination of children.
    pub fn find_or_create(
        &mut self,
        nw: NodeRef,
        ne: NodeRef,
        sw: NodeRef,
        se: NodeRef,
        level: u8,
    ) -> NodeRef {
        let key = (nw, ne, sw, se);
        if let Some(&idx) = self.interning.get(&key) {
            return Some(idx);
        }

        let population =
            self.population_of(nw) + self.population_of(ne) + self.population_of(sw) + self.population_of(se);
        let is_empty = self.is_empty_node(nw)
            && self.is_empty_node(ne)
            && self.is_empty_node(sw)
            && self.is_empty_node(se);
        let hash = mix_children(nw, ne, sw, se);

        let node = LifeNode::branch(nw, ne, sw, se, level, hash, is_empty, population);
        let idx = self.arena.insert(node);
        self.interning.insert(key, idx);
        log::trace!("node pool insert: level={level} population={population}");
        Some(idx)
    }

    /// The canonical fully-dead node at `level`. `level == 0` is `FALSE_NODE`
    /// itself; higher levels are real, interned branch nodes.
    pub fn empty_tree(&mut self, level: u8) -> NodeRef {
        if level == 0 {
            return None;
        }
        let cache_idx = level as usize - 1;
        if let Some(&cached) = self.empty_cache.get(cache_idx) {
            return cached;
        }
        let child = self.empty_tree(level - 1);
        let node = self.find_or_create(child, child, child, child, level);
        while self.empty_cache.len() < cache_idx {
            // Fill in any lower levels that were skipped, ensuring the cache
            // is dense (should not normally happen since callers build up
            // levels in order, but guards against a non-sequential caller).
            let missing_level = self.empty_cache.len() as u8 + 1;
            let missing = self.empty_tree(missing_level);
            self.empty_cache.push(missing);
        }
        self.empty_cache.push(node);
        node
    }

    pub fn fast_advance_cached(&self, node: Index) -> Option<NodeRef> {
        self.arena.get(node).and_then(|n| n.fast_advance.get().copied())
    }

    pub fn store_fast_advance(&self, node: Index, result: NodeRef) -> NodeRef {
        if let Some(n) = self.arena.get(node) {
            // Benign race: if another thread already installed a result,
            // the loser's value is simply discarded (see SPEC_FULL.md §5).
            let _ = n.fast_advance.set(result);
            n.fast_advance.get().copied().unwrap_or(result)
        } else {
            result
        }
    }

    pub fn slow_advance_cached(&self, node: NodeRef, max_advance: i64) -> Option<NodeRef> {
        self.slow_cache.get(&(node, max_advance)).copied()
    }

    pub fn store_slow_advance(&mut self, node: NodeRef, max_advance: i64, result: NodeRef) {
        self.slow_cache.insert((node, max_advance), result);
    }

    /// Mark-sweep the arena from a caller-supplied root set, freeing any
    /// node unreachable from those roots (plus the empty-tree cache and the
    /// `TRUE_NODE` sentinel, which are always kept). Outstanding handles to
    /// surviving nodes remain valid; only unreachable slots are freed.
    pub fn collect_garbage(&mut self, roots: &[NodeRef]) {
        let mut reachable: rustc_hash::FxHashSet<Index> = rustc_hash::FxHashSet::default();
        let mut stack: Vec<Index> = roots.iter().filter_map(|r| *r).collect();
        stack.extend(self.empty_cache.iter().filter_map(|r| *r));
        stack.push(self.true_node);

        while let Some(idx) = stack.pop() {
            if !reachable.insert(idx) {
                continue;
            }
            if let Some((nw, ne, sw, se)) = self.children_of(Some(idx)) {
                for child in [nw, ne, sw, se].into_iter().flatten() {
                    stack.push(child);
                }
            }
        }

        let dead: Vec<Index> = self
            .arena
            .iter()
            .map(|(idx, _)| idx)
            .filter(|idx| !reachable.contains(idx))
            .collect();

        for idx in dead {
            self.arena.remove(idx);
        }
        self.interning
            .retain(|_, idx| reachable.contains(idx));
        self.slow_cache.retain(|(node, _), result| {
            node.map(|i| reachable.contains(&i)).unwrap_or(true)
                && result.map(|i| reachable.contains(&i)).unwrap_or(true)
        });
        log::debug!("node pool gc: {} nodes retained", reachable.len());
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }
}

static POOL: OnceLock<Mutex<NodePool>> = OnceLock::new();

/// Access to the single process-wide node pool. Every `HashQuadtree` in the
/// process shares this instance; nodes interned by one grid are visible and
/// reusable by every other.
pub fn pool() -> &'static Mutex<NodePool> {
    POOL.get_or_init(|| Mutex::new(NodePool::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_identical_branches_share_a_handle() {
        let mut pool = NodePool::new();
        let t = pool.true_node();
        let a = pool.find_or_create(t, None, None, None, 1);
        let b = pool.find_or_create(t, None, None, None, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_tree_is_materialised_above_level_zero() {
        let mut pool = NodePool::new();
        assert_eq!(pool.empty_tree(0), None);
        let e1 = pool.empty_tree(1);
        assert!(e1.is_some());
        assert!(pool.is_empty_node(e1));
        let e2 = pool.empty_tree(2);
        assert_ne!(e1, e2);
        assert!(pool.is_empty_node(e2));
    }

    #[test]
    fn garbage_collection_keeps_reachable_nodes() {
        let mut pool = NodePool::new();
        let t = pool.true_node();
        let kept = pool.find_or_create(t, None, None, None, 1);
        let _orphan = pool.find_or_create(None, t, None, None, 1);
        let before = pool.len();
        pool.collect_garbage(&[kept]);
        assert!(pool.len() < before);
        assert!(pool.is_empty_node(None));
        assert_eq!(pool.population_of(kept), 1);
    }
}
