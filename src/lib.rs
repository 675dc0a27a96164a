//! # prefix-tree
//!
//! A compacting radix tree that maps words to sets of values.
//!
//! Words are case-folded once at the API boundary. Every node owns an edge
//! fragment (its label), a set of values and at most one child per character.
//! Removing a value goes through a reverse index from value to holding nodes,
//! so the work is proportional to the nodes touched rather than the tree size.
//! Afterwards the affected paths are repaired bottom-up: valueless leaves are
//! pruned and valueless single-child nodes are merged into their child.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use prefix_tree::PrefixTree;
//!
//! let mut tree: PrefixTree<u32> = PrefixTree::new();
//! tree.insert("Apple", 1)?;
//! tree.insert("application", 2)?;
//!
//! assert_eq!(tree.find("APPLE")?, HashSet::from([1]));
//! assert_eq!(tree.find_by_prefix("app")?, HashSet::from([1, 2]));
//!
//! tree.remove(&1);
//! assert!(tree.find("apple")?.is_empty());
//! # Ok::<(), prefix_tree::Error>(())
//! ```
//!
//! The tree is a plain mutable value with no interior synchronization. Callers
//! sharing one between threads serialize access themselves.

#![forbid(unsafe_code)]

mod error;
mod iter;
mod node;

pub use error::{Error, Result};
pub use iter::Nodes;
pub use node::NodeRef;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use tracing::{debug, trace};

use node::{Node, NodeArena, NodeId};

const LOG_TARGET: &str = "prefix_tree";

// =============================================================================
// Configuration
// =============================================================================

/// Construction options for [`PrefixTree`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Node slots and value index entries reserved up front.
    pub initial_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_capacity: 16,
        }
    }
}

// =============================================================================
// Word utilities
// =============================================================================

#[inline]
fn fold_case(word: &str) -> String {
    word.to_lowercase()
}

/// Byte length of the longest common prefix of `a` and `b`. Always lands on a
/// char boundary of both.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|&((_, x), y)| x != y)
        .map_or(a.len().min(b.len()), |((i, _), _)| i)
}

/// Splits a non-empty fragment into its edge character and the remainder.
fn split_edge(fragment: &str) -> (char, &str) {
    let mut chars = fragment.chars();
    match chars.next() {
        Some(edge) => (edge, chars.as_str()),
        None => unreachable!("edge split of an empty fragment"),
    }
}

// =============================================================================
// PrefixTree
// =============================================================================

/// Compacting radix tree from case-folded words to sets of values.
///
/// Equality and hashing look only at the node structure reachable from the
/// root (labels, value sets, children), never at arena layout or the value
/// index.
#[derive(Clone)]
pub struct PrefixTree<V> {
    nodes: NodeArena<V>,
    root: Option<NodeId>,
    /// Value index: every node currently holding each value.
    index: HashMap<V, HashSet<NodeId>>,
}

impl<V> PrefixTree<V> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            nodes: NodeArena::with_capacity(config.initial_capacity),
            root: None,
            index: HashMap::with_capacity(config.initial_capacity),
        }
    }

    /// Number of distinct values stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn root(&self) -> Option<NodeRef<'_, V>> {
        self.root.map(|id| NodeRef::new(&self.nodes, id))
    }

    /// Depth-first traversal of the whole tree. Each call starts afresh.
    pub fn nodes(&self) -> Nodes<'_, V> {
        match self.root {
            Some(root) => Nodes::new(&self.nodes, root),
            None => Nodes::empty(&self.nodes),
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.index.clear();
        debug!(target: LOG_TARGET, "cleared tree");
    }

    /// Approximate heap bytes held by nodes and the value index.
    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage()
            + self.index.capacity()
                * (std::mem::size_of::<V>() + std::mem::size_of::<HashSet<NodeId>>())
            + self
                .index
                .values()
                .map(|holders| holders.capacity() * std::mem::size_of::<NodeId>())
                .sum::<usize>()
    }

    /// Rebuild the node arena densely, dropping slots freed by removals.
    ///
    /// Returns the number of nodes rewritten. Structure and lookups are
    /// unaffected.
    pub fn compact(&mut self) -> usize {
        let Some(root) = self.root else {
            self.nodes.clear();
            return 0;
        };

        let old = std::mem::replace(&mut self.nodes, NodeArena::with_capacity(0));
        let (nodes, remap) = old.compacted(root);
        self.nodes = nodes;
        self.root = Some(remap[&root]);
        for holders in self.index.values_mut() {
            *holders = holders.iter().map(|id| remap[id]).collect();
        }

        debug!(target: LOG_TARGET, nodes = remap.len(), "compacted node arena");
        remap.len()
    }
}

impl<V: Eq + Hash + Clone> PrefixTree<V> {
    /// Associates `value` with `word`. Inserting an existing pair is a no-op.
    pub fn insert(&mut self, word: &str, value: V) -> Result<()> {
        if word.is_empty() {
            return Err(Error::EmptyWord);
        }
        let word = fold_case(word);

        match self.root {
            None => {
                let root = self.nodes.alloc(Node::new(word));
                self.root = Some(root);
                self.attach_value(root, value);
            }
            Some(root) => self.insert_from(root, &word, value),
        }
        Ok(())
    }

    /// All values associated with exactly `word`.
    pub fn find(&self, word: &str) -> Result<HashSet<V>> {
        if word.is_empty() {
            return Err(Error::EmptyWord);
        }
        let word = fold_case(word);

        Ok(self
            .locate(&word)
            .map(|id| self.nodes[id].values().clone())
            .unwrap_or_default())
    }

    /// All values associated with any word starting with `prefix`.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<HashSet<V>> {
        if prefix.is_empty() {
            return Err(Error::EmptyPrefix);
        }
        let prefix = fold_case(prefix);

        let mut found = HashSet::new();
        if let Some(subtree) = self.locate_prefix(&prefix) {
            for node in Nodes::new(&self.nodes, subtree) {
                found.extend(node.values().iter().cloned());
            }
        }
        Ok(found)
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.index.contains_key(value)
    }

    /// Removes `value` from every word it is associated with and compacts the
    /// affected paths. Returns `false` (and does nothing) if it was absent.
    pub fn remove(&mut self, value: &V) -> bool {
        let Some(holders) = self.index.remove(value) else {
            return false;
        };
        debug!(target: LOG_TARGET, nodes = holders.len(), "removing value");

        // A holder keeps `value` until its own turn, so repairing one holder
        // never frees another.
        for node in holders {
            let removed = self.nodes[node].remove_value(value);
            debug_assert!(removed, "value index out of sync at {node:?}");
            self.repair(node);
        }
        true
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        self.index.shrink_to_fit();
        for holders in self.index.values_mut() {
            holders.shrink_to_fit();
        }
    }

    fn attach_value(&mut self, node: NodeId, value: V) {
        if self.nodes[node].add_value(value.clone()) {
            self.index.entry(value).or_default().insert(node);
        }
    }

    fn insert_from(&mut self, mut node: NodeId, mut word: &str, value: V) {
        loop {
            let label = self.nodes[node].label();
            let label_len = label.len();
            let common = common_prefix_len(label, word);

            if common == label_len && common == word.len() {
                self.attach_value(node, value);
                return;
            }

            if common < label_len {
                self.split(node, common, &word[common..], value);
                return;
            }

            let (edge, rest) = split_edge(&word[common..]);
            match self.nodes[node].child(edge) {
                Some(child) => {
                    node = child;
                    word = rest;
                }
                None => {
                    let leaf = self.nodes.alloc(Node::new(rest));
                    self.nodes.set_child(node, edge, leaf);
                    self.attach_value(leaf, value);
                    return;
                }
            }
        }
    }

    /// Splits `node` after `at` bytes of its label. The shared part moves into
    /// a new intermediate node that takes `node`'s place; `word_rest` is what
    /// remains of the inserted word past the shared part.
    fn split(&mut self, node: NodeId, at: usize, word_rest: &str, value: V) {
        let label = self.nodes[node].take_label();
        let (shared, tail) = label.split_at(at);
        let (node_edge, node_rest) = split_edge(tail);

        let mid = self.nodes.alloc(Node::new(shared));
        self.nodes[node].set_label(node_rest.to_owned());

        match self.nodes[node].parent() {
            None => self.root = Some(mid),
            Some(link) => self.nodes.set_child(link.node, link.edge, mid),
        }
        self.nodes.set_child(mid, node_edge, node);

        if word_rest.is_empty() {
            self.attach_value(mid, value);
        } else {
            let (edge, rest) = split_edge(word_rest);
            let leaf = self.nodes.alloc(Node::new(rest));
            self.nodes.set_child(mid, edge, leaf);
            self.attach_value(leaf, value);
        }

        trace!(target: LOG_TARGET, shared, node_edge = %node_edge, "split node");
    }

    /// Node holding exactly `word`.
    fn locate(&self, mut word: &str) -> Option<NodeId> {
        let mut node = self.root?;
        loop {
            let label = self.nodes[node].label();
            let common = common_prefix_len(label, word);
            if common < label.len() {
                return None;
            }

            let rest = &word[common..];
            if rest.is_empty() {
                return Some(node);
            }
            let (edge, rest) = split_edge(rest);
            node = self.nodes[node].child(edge)?;
            word = rest;
        }
    }

    /// Topmost node whose subtree spells only words starting with `prefix`.
    fn locate_prefix(&self, mut prefix: &str) -> Option<NodeId> {
        let mut node = self.root?;
        loop {
            let label = self.nodes[node].label();
            let common = common_prefix_len(label, prefix);
            if common == prefix.len() {
                return Some(node);
            }
            if common < label.len() {
                return None;
            }

            let (edge, rest) = split_edge(&prefix[common..]);
            node = self.nodes[node].child(edge)?;
            prefix = rest;
        }
    }
}

impl<V> PrefixTree<V> {
    /// Restores compactness at `node` after it lost a value or a child,
    /// cascading to the parent while nodes get deleted.
    fn repair(&mut self, mut node: NodeId) {
        loop {
            let current = &self.nodes[node];
            if current.child_count() > 1 || !current.values().is_empty() {
                return;
            }

            if let Some((edge, child)) = current.sole_child() {
                self.merge_into_child(node, edge, child);
                return;
            }

            let parent = current.parent();
            match parent {
                None => {
                    self.nodes.free(node);
                    self.root = None;
                    trace!(target: LOG_TARGET, "removed last node");
                    return;
                }
                Some(link) => {
                    self.nodes.remove_child(link.node, link.edge);
                    self.nodes.free(node);
                    trace!(target: LOG_TARGET, edge = %link.edge, "pruned leaf");
                    node = link.node;
                }
            }
        }
    }

    /// Folds a valueless single-child `node` into `child`, which takes its
    /// place under the same parent edge (or as root).
    fn merge_into_child(&mut self, node: NodeId, edge: char, child: NodeId) {
        let parent = self.nodes[node].parent();
        if let Some(link) = parent {
            self.nodes.remove_child(link.node, link.edge);
        }
        self.nodes.remove_child(node, edge);

        let mut label = self.nodes.free(node).into_label();
        label.push(edge);
        label.push_str(self.nodes[child].label());

        trace!(target: LOG_TARGET, label = %label, "merged node into child");
        self.nodes[child].set_label(label);

        match parent {
            None => self.root = Some(child),
            Some(link) => self.nodes.set_child(link.node, link.edge, child),
        }
    }
}

impl<V> Default for PrefixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Eq + Hash> PartialEq for PrefixTree<V> {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

impl<V: Eq + Hash> Eq for PrefixTree<V> {}

impl<V: Hash> Hash for PrefixTree<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.root().hash(state);
    }
}

impl<V: fmt::Debug> fmt::Debug for PrefixTree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixTree")
            .field("len", &self.len())
            .field("root", &self.root())
            .finish()
    }
}


#[cfg(test)]
mod proptests;
