use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use thunderdome::Index;

/// A handle to a node in the process-wide [`crate::pool::NodePool`] arena.
///
/// `None` is the `FALSE_NODE` sentinel: the absence of a handle, used for a
/// dead leaf at level 0 and for an entirely empty `HashQuadtree`. A branch
/// that is empty at level `k >= 1` is *not* `None` — it is a real, interned
/// node whose children happen to all be empty (see `NodePool::empty_tree`).
pub type NodeRef = Option<Index>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum NodeKind {
    /// `TRUE_NODE`: the single live leaf at level 0.
    True,
    Branch {
        nw: NodeRef,
        ne: NodeRef,
        sw: NodeRef,
        se: NodeRef,
    },
}

/// An immutable quadtree node living in the [`crate::pool::NodePool`] arena.
///
/// Two nodes are structurally equal iff their four children are
/// handle-equal; hash-consing in the pool guarantees structural equality
/// implies the two nodes are, in fact, the same arena slot.
pub(crate) struct LifeNode {
    pub kind: NodeKind,
    pub level: u8,
    pub hash: u64,
    pub is_empty: bool,
    pub population: u64,
    /// Memoised fast-path advance: the centered result 2^(level-2)
    /// generations forward, valid for levels >= 2. Lives on the node itself
    /// (rather than a side table) because every caller wants the same,
    /// single "maximal" answer for a given node.
    pub(crate) fast_advance: OnceLock<NodeRef>,
}

impl LifeNode {
    pub(crate) fn leaf_true(hash: u64) -> Self {
        Self {
            kind: NodeKind::True,
            level: 0,
            hash,
            is_empty: false,
            population: 1,
            fast_advance: OnceLock::new(),
        }
    }

    pub(crate) fn branch(
        nw: NodeRef,
        ne: NodeRef,
        sw: NodeRef,
        se: NodeRef,
        level: u8,
        hash: u64,
        is_empty: bool,
        population: u64,
    ) -> Self {
        Self {
            kind: NodeKind::Branch { nw, ne, sw, se },
            level,
            hash,
            is_empty,
            population,
            fast_advance: OnceLock::new(),
        }
    }

    pub(crate) fn children(&self) -> Option<(NodeRef, NodeRef, NodeRef, NodeRef)> {
        match self.kind {
            NodeKind::Branch { nw, ne, sw, se } => Some((nw, ne, sw, se)),
            NodeKind::True => None,
        }
    }
}

/// Mixes the four child handles into a node hash. Deliberately simple and
/// order-sensitive (swapping two children must change the hash) since it
/// only needs to distribute well, not resist adversarial input.
pub(crate) fn mix_children(nw: NodeRef, ne: NodeRef, sw: NodeRef, se: NodeRef) -> u64 {
    fn slot(n: NodeRef) -> u64 {
        match n {
            None => 0,
            Some(idx) => {
                let mut hasher = rustc_hash::FxHasher::default();
                idx.hash(&mut hasher);
                hasher.finish()
            }
        }
    }

    let mut h = 0x9E37_79B9_7F4A_7C15u64;
    for (i, part) in [slot(nw), slot(ne), slot(sw), slot(se)].into_iter().enumerate() {
        h ^= part.wrapping_add(0x9E37_79B9_7F4A_7C15u64.wrapping_mul(i as u64 + 1));
        h = h.rotate_left(13).wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    }
    h
}
