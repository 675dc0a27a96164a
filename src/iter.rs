use std::iter::FusedIterator;

use crate::node::{NodeArena, NodeId, NodeRef};

/// Lazy depth-first iterator over a subtree, subtree root first.
///
/// Order among siblings is not part of the contract.
pub struct Nodes<'a, V> {
    arena: &'a NodeArena<V>,
    stack: Vec<NodeId>,
}

impl<'a, V> Nodes<'a, V> {
    pub(crate) fn new(arena: &'a NodeArena<V>, root: NodeId) -> Self {
        Self {
            arena,
            stack: vec![root],
        }
    }

    pub(crate) fn empty(arena: &'a NodeArena<V>) -> Self {
        Self {
            arena,
            stack: Vec::new(),
        }
    }
}

impl<'a, V> Iterator for Nodes<'a, V> {
    type Item = NodeRef<'a, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let arena = self.arena;
        // Reversed so the smallest edge character pops first.
        self.stack
            .extend(arena[id].children().rev().map(|(_, child)| child));
        Some(NodeRef::new(arena, id))
    }
}

impl<V> FusedIterator for Nodes<'_, V> {}
