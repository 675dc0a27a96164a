use super::{NodeId, PrefixTree};

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

fn validate_tree<V: Eq + Hash + Clone + fmt::Debug>(t: &PrefixTree<V>) {
    let Some(root) = t.root else {
        assert_eq!(t.nodes.len(), 0, "empty tree must not hold live nodes");
        assert!(t.index.is_empty(), "empty tree must have an empty value index");
        return;
    };
    assert!(t.nodes[root].parent().is_none(), "root must not have a parent");

    let mut reachable = 0usize;
    let mut mirrored: HashMap<V, HashSet<NodeId>> = HashMap::new();
    for view in t.nodes() {
        reachable += 1;
        let id = view.id();
        let node = &t.nodes[id];

        for (edge, child) in node.children() {
            let link = t.nodes[child]
                .parent()
                .expect("child must link back to its parent");
            assert_eq!(link.node, id, "child under {edge:?} points at another parent");
            assert_eq!(link.edge, edge, "child parent edge label mismatch");
        }

        if node.values().is_empty() {
            assert!(
                node.child_count() >= 2,
                "valueless node {:?} left with {} children",
                node.label(),
                node.child_count()
            );
        }

        for value in node.values() {
            mirrored.entry(value.clone()).or_default().insert(id);
        }
    }

    assert_eq!(
        reachable,
        t.nodes.len(),
        "arena live count must match reachable nodes"
    );
    assert_eq!(mirrored, t.index, "value index must mirror node values");
}

/// Reference model: the plain set of (folded word, value) pairs.
#[derive(Default)]
struct Model {
    pairs: HashSet<(String, u8)>,
}

impl Model {
    fn insert(&mut self, word: &str, value: u8) {
        self.pairs.insert((word.to_lowercase(), value));
    }

    fn remove(&mut self, value: u8) -> bool {
        let before = self.pairs.len();
        self.pairs.retain(|(_, v)| *v != value);
        before != self.pairs.len()
    }

    fn find(&self, word: &str) -> HashSet<u8> {
        let word = word.to_lowercase();
        self.pairs
            .iter()
            .filter(|(w, _)| *w == word)
            .map(|&(_, v)| v)
            .collect()
    }

    fn find_by_prefix(&self, prefix: &str) -> HashSet<u8> {
        let prefix = prefix.to_lowercase();
        self.pairs
            .iter()
            .filter(|(w, _)| w.starts_with(&prefix))
            .map(|&(_, v)| v)
            .collect()
    }

    fn len(&self) -> usize {
        self.pairs.iter().map(|&(_, v)| v).collect::<HashSet<_>>().len()
    }

    fn rebuild(&self) -> PrefixTree<u8> {
        let mut t = PrefixTree::new();
        for (word, value) in &self.pairs {
            t.insert(word, *value).unwrap();
        }
        t
    }
}

fn word_strategy() -> impl Strategy<Value = String> {
    // Tiny alphabet with a folding pair outside ASCII, so words share paths.
    "[abcAéÉ]{1,5}"
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 6)]
    Insert(
        #[proptest(strategy = "word_strategy()")] String,
        #[proptest(strategy = "0u8..12")] u8,
    ),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "0u8..12")] u8),
    #[proptest(weight = 2)]
    Find(#[proptest(strategy = "word_strategy()")] String),
    #[proptest(weight = 2)]
    FindByPrefix(#[proptest(strategy = "word_strategy()")] String),
    Compact,
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_model(ops in prop::collection::vec(any::<Op>(), 0..=300)) {
        let mut t: PrefixTree<u8> = PrefixTree::new();
        let mut m = Model::default();

        for op in ops {
            match op {
                Op::Insert(word, value) => {
                    t.insert(&word, value).unwrap();
                    m.insert(&word, value);
                    validate_tree(&t);
                }
                Op::Remove(value) => {
                    let before = t.node_count();
                    prop_assert_eq!(t.remove(&value), m.remove(value));
                    prop_assert!(t.node_count() <= before);
                    prop_assert!(!t.contains_value(&value));
                    validate_tree(&t);
                }
                Op::Find(word) => {
                    prop_assert_eq!(t.find(&word).unwrap(), m.find(&word));
                }
                Op::FindByPrefix(prefix) => {
                    prop_assert_eq!(t.find_by_prefix(&prefix).unwrap(), m.find_by_prefix(&prefix));
                }
                Op::Compact => {
                    let before = t.clone();
                    prop_assert_eq!(t.compact(), t.node_count());
                    prop_assert_eq!(&t, &before);
                    validate_tree(&t);
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        // The compacted shape depends only on the surviving pairs.
        let rebuilt = m.rebuild();
        prop_assert_eq!(hash_of(&t), hash_of(&rebuilt));
        prop_assert_eq!(t, rebuilt);
    }

    #[test]
    fn prop_prefixes_of_inserted_words_match(
        pairs in prop::collection::vec((word_strategy(), 0u8..12), 1..40),
        cut in 1usize..5
    ) {
        let mut t: PrefixTree<u8> = PrefixTree::new();
        for (word, value) in &pairs {
            t.insert(word, *value).unwrap();
        }
        validate_tree(&t);

        for (word, value) in &pairs {
            let prefix: String = word.chars().take(cut).collect();
            prop_assert!(t.find(word).unwrap().contains(value));
            prop_assert!(t.find(&word.to_uppercase()).unwrap().contains(value));
            prop_assert!(t.find_by_prefix(&prefix).unwrap().contains(value));
        }
    }
}

fn hash_of<T: Hash>(t: &T) -> u64 {
    let mut h = DefaultHasher::new();
    t.hash(&mut h);
    h.finish()
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

const SMALL_SET: [(&str, u8); 6] = [
    ("a", 0),
    ("b", 1),
    ("ab", 2),
    ("abc", 3),
    ("abd", 4),
    ("ba", 5),
];

#[test]
fn exhaustive_insert_order_small_set() {
    let mut reference: PrefixTree<u8> = PrefixTree::new();
    for (word, value) in SMALL_SET {
        reference.insert(word, value).unwrap();
    }
    validate_tree(&reference);

    for_each_permutation(&SMALL_SET, |perm| {
        let mut t: PrefixTree<u8> = PrefixTree::new();
        for (word, value) in perm {
            t.insert(word, value).unwrap();
        }

        validate_tree(&t);
        assert_eq!(t.node_count(), reference.node_count());
        assert_eq!(t, reference);
        assert_eq!(hash_of(&t), hash_of(&reference));
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let mut base: PrefixTree<u8> = PrefixTree::new();
    for (word, value) in SMALL_SET {
        base.insert(word, value).unwrap();
    }
    // One word holding two values, so some removals leave the node standing.
    base.insert("ab", 0).unwrap();

    let values: Vec<u8> = SMALL_SET.iter().map(|&(_, v)| v).collect();
    for_each_permutation(&values, |perm| {
        let mut t = base.clone();
        let mut remaining = values.len();

        for value in perm {
            assert!(t.remove(&value));
            remaining -= 1;
            assert_eq!(t.len(), remaining);
            validate_tree(&t);
        }
        assert_eq!(t.node_count(), 0);
        assert!(t.root.is_none());
    });
}
