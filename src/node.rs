//! Arena-backed trie nodes.
//!
//! Every node lives in a single slot vector owned by the tree. Child edges and
//! the upward link are plain [`NodeId`]s, so the parent link is navigation only
//! and never takes part in ownership.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Index, IndexMut};

use smallvec::SmallVec;

use crate::iter::Nodes;

/// Slot index into a [`NodeArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parent node plus the character keying this node in the parent's child map.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct ParentLink {
    pub(crate) node: NodeId,
    pub(crate) edge: char,
}

type ChildMap = SmallVec<[(char, NodeId); 4]>;

#[derive(Clone, Debug)]
pub(crate) struct Node<V> {
    label: String,
    values: HashSet<V>,
    /// Sorted by edge character, one entry per character.
    children: ChildMap,
    parent: Option<ParentLink>,
}

impl<V> Node<V> {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            values: HashSet::new(),
            children: SmallVec::new(),
            parent: None,
        }
    }

    #[inline]
    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    pub(crate) fn take_label(&mut self) -> String {
        std::mem::take(&mut self.label)
    }

    pub(crate) fn into_label(self) -> String {
        self.label
    }

    #[inline]
    pub(crate) fn values(&self) -> &HashSet<V> {
        &self.values
    }

    #[inline]
    pub(crate) fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    #[inline]
    fn slot(&self, edge: char) -> Result<usize, usize> {
        self.children.binary_search_by(|(c, _)| c.cmp(&edge))
    }

    #[inline]
    pub(crate) fn child(&self, edge: char) -> Option<NodeId> {
        self.slot(edge).ok().map(|i| self.children[i].1)
    }

    #[inline]
    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn children(
        &self,
    ) -> impl DoubleEndedIterator<Item = (char, NodeId)> + ExactSizeIterator + '_ {
        self.children.iter().copied()
    }

    pub(crate) fn sole_child(&self) -> Option<(char, NodeId)> {
        match self.children.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn heap_bytes(&self) -> usize {
        let children = if self.children.spilled() {
            self.children.capacity() * std::mem::size_of::<(char, NodeId)>()
        } else {
            0
        };
        self.label.capacity() + self.values.capacity() * std::mem::size_of::<V>() + children
    }
}

impl<V: Eq + Hash> Node<V> {
    pub(crate) fn add_value(&mut self, value: V) -> bool {
        self.values.insert(value)
    }

    pub(crate) fn remove_value(&mut self, value: &V) -> bool {
        self.values.remove(value)
    }

    fn shrink_to_fit(&mut self) {
        self.label.shrink_to_fit();
        self.values.shrink_to_fit();
        self.children.shrink_to_fit();
    }
}

/// Slot arena for trie nodes, with a free list of released slots.
#[derive(Clone, Debug)]
pub(crate) struct NodeArena<V> {
    slots: Vec<Option<Node<V>>>,
    free: Vec<NodeId>,
    live: usize,
}

impl<V> NodeArena<V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of live nodes.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    #[cfg(test)]
    pub(crate) fn free_slots(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn alloc(&mut self, node: Node<V>) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            debug_assert!(self.slots[id.index()].is_none());
            self.slots[id.index()] = Some(node);
            return id;
        }
        let id = NodeId(u32::try_from(self.slots.len()).expect("node arena exceeds u32 slots"));
        self.slots.push(Some(node));
        id
    }

    /// Releases a slot. The caller detaches the node from its parent first.
    pub(crate) fn free(&mut self, id: NodeId) -> Node<V> {
        let Some(node) = self.slots[id.index()].take() else {
            panic!("double free of node {id:?}");
        };
        self.free.push(id);
        self.live -= 1;
        node
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }

    /// Attaches `child` under `parent` at `edge`. A different child previously
    /// stored at `edge` loses its parent link.
    pub(crate) fn set_child(&mut self, parent: NodeId, edge: char, child: NodeId) {
        let p = &mut self[parent];
        let displaced = match p.slot(edge) {
            Ok(i) => Some(std::mem::replace(&mut p.children[i].1, child)),
            Err(i) => {
                p.children.insert(i, (edge, child));
                None
            }
        };
        if let Some(old) = displaced.filter(|&old| old != child) {
            self[old].parent = None;
        }
        self[child].parent = Some(ParentLink { node: parent, edge });
    }

    /// Detaches the child at `edge`, clearing its parent link.
    pub(crate) fn remove_child(&mut self, parent: NodeId, edge: char) -> Option<NodeId> {
        let p = &mut self[parent];
        let i = p.slot(edge).ok()?;
        let (_, child) = p.children.remove(i);
        self[child].parent = None;
        Some(child)
    }

    /// Moves every node reachable from `root` into a dense arena in
    /// depth-first order. Returns the new arena and the old to new id mapping.
    pub(crate) fn compacted(mut self, root: NodeId) -> (Self, HashMap<NodeId, NodeId>) {
        let order: Vec<NodeId> = Nodes::new(&self, root).map(NodeRef::id).collect();
        let remap: HashMap<NodeId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(i, &old)| (old, NodeId(i as u32)))
            .collect();

        let mut slots = Vec::with_capacity(order.len());
        for old in &order {
            let Some(mut node) = self.slots[old.index()].take() else {
                panic!("dangling node id {old:?}");
            };
            for (_, child) in node.children.iter_mut() {
                let moved = remap[&*child];
                *child = moved;
            }
            if let Some(link) = node.parent.as_mut() {
                link.node = remap[&link.node];
            }
            slots.push(Some(node));
        }

        let live = slots.len();
        (
            Self {
                slots,
                free: Vec::new(),
                live,
            },
            remap,
        )
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.slots.capacity() * std::mem::size_of::<Option<Node<V>>>()
            + self.free.capacity() * std::mem::size_of::<NodeId>()
            + self.slots.iter().flatten().map(Node::heap_bytes).sum::<usize>()
    }
}

impl<V: Eq + Hash> NodeArena<V> {
    pub(crate) fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
        self.free.shrink_to_fit();
        for node in self.slots.iter_mut().flatten() {
            node.shrink_to_fit();
        }
    }
}

impl<V> Index<NodeId> for NodeArena<V> {
    type Output = Node<V>;

    #[inline]
    fn index(&self, id: NodeId) -> &Node<V> {
        match self.slots.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("dangling node id {id:?}"),
        }
    }
}

impl<V> IndexMut<NodeId> for NodeArena<V> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Node<V> {
        match self.slots.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("dangling node id {id:?}"),
        }
    }
}

/// Read-only view of a node inside a [`PrefixTree`](crate::PrefixTree).
///
/// Equality and hashing are structural over the whole subtree: label, value
/// set and children by edge character. Parent links are ignored.
pub struct NodeRef<'a, V> {
    arena: &'a NodeArena<V>,
    id: NodeId,
}

impl<V> Clone for NodeRef<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for NodeRef<'_, V> {}

impl<'a, V> NodeRef<'a, V> {
    #[inline]
    pub(crate) fn new(arena: &'a NodeArena<V>, id: NodeId) -> Self {
        Self { arena, id }
    }

    #[inline]
    pub(crate) fn id(self) -> NodeId {
        self.id
    }

    #[inline]
    fn node(self) -> &'a Node<V> {
        &self.arena[self.id]
    }

    /// The edge fragment this node contributes to the words below it.
    pub fn label(self) -> &'a str {
        self.node().label()
    }

    pub fn values(self) -> &'a HashSet<V> {
        self.node().values()
    }

    pub fn child(self, edge: char) -> Option<NodeRef<'a, V>> {
        self.node().child(edge).map(|id| NodeRef::new(self.arena, id))
    }

    pub fn has_child(self, edge: char) -> bool {
        self.node().child(edge).is_some()
    }

    pub fn child_count(self) -> usize {
        self.node().child_count()
    }

    pub fn is_leaf(self) -> bool {
        self.child_count() == 0
    }

    /// Edge characters of the outgoing edges, in ascending order.
    pub fn edge_labels(self) -> impl Iterator<Item = char> + 'a {
        self.node().children().map(|(edge, _)| edge)
    }

    pub fn children(self) -> impl Iterator<Item = (char, NodeRef<'a, V>)> + 'a {
        let arena = self.arena;
        self.node()
            .children()
            .map(move |(edge, id)| (edge, NodeRef::new(arena, id)))
    }

    pub fn parent(self) -> Option<NodeRef<'a, V>> {
        self.node()
            .parent()
            .map(|link| NodeRef::new(self.arena, link.node))
    }

    /// The character on the edge from the parent to this node. `None` for the root.
    pub fn parent_edge_label(self) -> Option<char> {
        self.node().parent().map(|link| link.edge)
    }

    /// Depth-first traversal of the subtree rooted here, this node first.
    pub fn descendants(self) -> Nodes<'a, V> {
        Nodes::new(self.arena, self.id)
    }
}

impl<V: Eq + Hash> PartialEq for NodeRef<'_, V> {
    fn eq(&self, other: &Self) -> bool {
        self.label() == other.label()
            && self.values() == other.values()
            && self.child_count() == other.child_count()
            && self
                .children()
                .zip(other.children())
                .all(|((a_edge, a), (b_edge, b))| a_edge == b_edge && a == b)
    }
}

impl<V: Eq + Hash> Eq for NodeRef<'_, V> {}

impl<V: Hash> Hash for NodeRef<'_, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.label().hash(state);

        // Value sets are unordered: fold per-value digests commutatively.
        let digest = self.values().iter().fold(0u64, |acc, value| {
            let mut h = DefaultHasher::new();
            value.hash(&mut h);
            acc.wrapping_add(h.finish())
        });
        state.write_usize(self.values().len());
        state.write_u64(digest);

        state.write_usize(self.child_count());
        for (edge, child) in self.children() {
            edge.hash(state);
            child.hash(state);
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for NodeRef<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Children<'a, V>(NodeRef<'a, V>);

        impl<V: fmt::Debug> fmt::Debug for Children<'_, V> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_map().entries(self.0.children()).finish()
            }
        }

        f.debug_struct("Node")
            .field("label", &self.label())
            .field("values", self.values())
            .field("children", &Children(*self))
            .finish()
    }
}
