// Copyright 2026 coalescent Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt::Debug, sync::Arc};

use crate::{
    iter::Iter,
    node::{Leaf, Node},
    txn::Txn,
};

/// Opaque handle on the root node of a tree or transaction.
///
/// Two handles compare equal iff they refer to the same node, which makes the comparison O(1). Holding a handle keeps
/// the node alive; a transaction whose current root is also held by a handle copies the root on its next write.
pub struct Root<V>(pub(crate) Arc<Node<V>>);

impl<V> Clone for Root<V> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<V> PartialEq for Root<V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<V> Eq for Root<V> {}

impl<V> Debug for Root<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Root").field(&Arc::as_ptr(&self.0)).finish()
    }
}

/// Immutable radix tree.
///
/// Cloning a tree is O(1) and shares every node.
pub struct Tree<V> {
    pub(crate) root: Arc<Node<V>>,
    pub(crate) len: usize,
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
        }
    }
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Debug for Tree<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

fn entry<V>(leaf: &Leaf<V>) -> (&[u8], &V) {
    (&*leaf.key, &leaf.value)
}

impl<V> Tree<V> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            root: Arc::default(),
            len: 0,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the value under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.root.get(key).map(|leaf| &leaf.value)
    }

    /// Returns `true` if an entry exists under `key`.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.root.get(key).is_some()
    }

    /// Handle on the root node, for identity comparison.
    pub fn root(&self) -> Root<V> {
        Root(self.root.clone())
    }

    /// Returns `true` if both trees share the same root node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// Start a transaction based on this tree. The tree itself is never modified.
    pub fn txn(&self) -> Txn<V> {
        Txn::new(self.root.clone(), self.len)
    }

    /// Iterate over all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(Some(&*self.root))
    }

    /// Iterate over the entries whose key starts with `prefix`, in ascending key order.
    pub fn iter_prefix(&self, prefix: &[u8]) -> Iter<'_, V> {
        Iter::new(self.root.seek_prefix(prefix))
    }

    /// Find the entry with the longest key that is a prefix of `key`.
    pub fn longest_prefix(&self, key: &[u8]) -> Option<(&[u8], &V)> {
        self.root.longest_prefix(key).map(entry)
    }

    /// Entry with the smallest key.
    pub fn first(&self) -> Option<(&[u8], &V)> {
        self.root.first().map(entry)
    }

    /// Entry with the largest key.
    pub fn last(&self) -> Option<(&[u8], &V)> {
        self.root.last().map(entry)
    }
}

impl<V> Tree<V>
where
    V: Clone,
{
    /// Insert an entry, returning the new tree and the value previously stored under `key`.
    pub fn insert(&self, key: &[u8], value: V) -> (Self, Option<V>) {
        let mut txn = self.txn();
        let old = txn.insert(key, value);
        (txn.commit(), old)
    }

    /// Delete an entry, returning the new tree and the deleted value.
    ///
    /// If `key` is absent the returned tree shares the root of `self`.
    pub fn delete(&self, key: &[u8]) -> (Self, Option<V>) {
        let mut txn = self.txn();
        let old = txn.delete(key);
        (txn.commit(), old)
    }
}

impl<K, V> FromIterator<(K, V)> for Tree<V>
where
    K: AsRef<[u8]>,
    V: Clone,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut txn = Tree::new().txn();
        for (key, value) in iter {
            txn.insert(key.as_ref(), value);
        }
        txn.commit()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use itertools::Itertools;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;

    fn validate<V>(tree: &Tree<V>) {
        assert_eq!(tree.root.validate(true), tree.len());
    }

    #[test]
    fn test_insert_get_delete() {
        let tree = Tree::new();
        let (tree, old) = tree.insert(b"a", 1);
        assert_eq!(old, None);
        assert_eq!(tree.get(b"a"), Some(&1));

        let (tree, old) = tree.insert(b"a", 2);
        assert_eq!(old, Some(1));
        assert_eq!(tree.get(b"a"), Some(&2));
        assert_eq!(tree.len(), 1);

        let (tree, old) = tree.delete(b"missing");
        assert_eq!(old, None);
        assert_eq!(tree.len(), 1);

        let (tree, old) = tree.delete(b"a");
        assert_eq!(old, Some(2));
        assert!(tree.is_empty());
        assert_eq!(tree.get(b"a"), None);
        validate(&tree);
    }

    #[test]
    fn test_empty_key() {
        let (tree, _) = Tree::new().insert(b"", "root");
        let (tree, _) = tree.insert(b"x", "x");
        assert_eq!(tree.get(b""), Some(&"root"));
        assert_eq!(tree.first(), Some((&b""[..], &"root")));
        validate(&tree);

        let (tree, old) = tree.delete(b"");
        assert_eq!(old, Some("root"));
        assert_eq!(tree.get(b"x"), Some(&"x"));
        validate(&tree);
    }

    #[test]
    fn test_split_and_merge() {
        let tree: Tree<u32> = [("romane", 1), ("romanus", 2), ("romulus", 3), ("rubens", 4), ("ruber", 5)]
            .into_iter()
            .collect();
        validate(&tree);
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.get(b"rom"), None);
        assert_eq!(tree.get(b"romanus"), Some(&2));

        // Deleting down to one key under a split node merges the path back.
        let (tree, _) = tree.delete(b"romane");
        validate(&tree);
        let (tree, _) = tree.delete(b"romulus");
        validate(&tree);
        let (tree, _) = tree.delete(b"rubens");
        validate(&tree);
        assert_eq!(tree.iter().map(|(k, _)| k.to_vec()).collect_vec(), vec![b"romanus".to_vec(), b"ruber".to_vec()]);
    }

    #[test]
    fn test_insert_prefix_of_existing() {
        let (tree, _) = Tree::new().insert(b"foobar", 1);
        let (tree, _) = tree.insert(b"foo", 2);
        let (tree, _) = tree.insert(b"fo", 3);
        validate(&tree);
        assert_eq!(tree.get(b"foobar"), Some(&1));
        assert_eq!(tree.get(b"foo"), Some(&2));
        assert_eq!(tree.get(b"fo"), Some(&3));
        assert_eq!(tree.get(b"f"), None);
        assert_eq!(tree.get(b"foob"), None);
    }

    #[test]
    fn test_old_versions_are_untouched() {
        let (v1, _) = Tree::new().insert(b"k1", 1);
        let (v2, _) = v1.insert(b"k2", 2);
        let (v3, _) = v2.delete(b"k1");
        let (v4, _) = v3.insert(b"k2", 22);

        assert_eq!(v1.iter().collect_vec(), vec![(&b"k1"[..], &1)]);
        assert_eq!(v2.iter().collect_vec(), vec![(&b"k1"[..], &1), (&b"k2"[..], &2)]);
        assert_eq!(v3.iter().collect_vec(), vec![(&b"k2"[..], &2)]);
        assert_eq!(v4.iter().collect_vec(), vec![(&b"k2"[..], &22)]);
    }

    #[test]
    fn test_root_identity() {
        let (tree, _) = Tree::new().insert(b"a", 1);
        let clone = tree.clone();
        assert!(tree.ptr_eq(&clone));
        assert_eq!(tree.root(), clone.root());

        let (missed, _) = tree.delete(b"b");
        assert!(missed.ptr_eq(&tree));

        let (changed, _) = tree.insert(b"b", 2);
        assert!(!changed.ptr_eq(&tree));
        assert_ne!(changed.root(), tree.root());
    }

    #[test]
    fn test_prefix_queries() {
        let tree: Tree<usize> = ["api", "apple", "application", "apply", "banana", "band"]
            .into_iter()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();

        let keys = |iter: Iter<'_, usize>| iter.map(|(k, _)| String::from_utf8(k.to_vec()).unwrap()).collect_vec();
        assert_eq!(keys(tree.iter_prefix(b"app")), vec!["apple", "application", "apply"]);
        assert_eq!(keys(tree.iter_prefix(b"appl")), vec!["apple", "application", "apply"]);
        assert_eq!(keys(tree.iter_prefix(b"ban")), vec!["banana", "band"]);
        assert_eq!(keys(tree.iter_prefix(b"c")), Vec::<String>::new());
        assert_eq!(keys(tree.iter_prefix(b"")).len(), 6);

        assert_eq!(tree.longest_prefix(b"applications"), Some((&b"application"[..], &2)));
        assert_eq!(tree.longest_prefix(b"apiary"), Some((&b"api"[..], &0)));
        assert_eq!(tree.longest_prefix(b"ap"), None);

        assert_eq!(tree.first(), Some((&b"api"[..], &0)));
        assert_eq!(tree.last(), Some((&b"band"[..], &5)));
        assert_eq!(Tree::<usize>::new().first(), None);
        assert_eq!(Tree::<usize>::new().last(), None);
    }

    #[test]
    fn test_random_ops_against_btree_map() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut tree = Tree::new();
        let mut model = BTreeMap::new();
        let mut versions = vec![];

        for i in 0..4000u64 {
            let len = rng.random_range(0..6);
            let key = (0..len).map(|_| rng.random_range(b'a'..=b'd')).collect_vec();
            if rng.random_bool(0.6) {
                let (next, old) = tree.insert(&key, i);
                assert_eq!(old, model.insert(key, i));
                tree = next;
            } else {
                let (next, old) = tree.delete(&key);
                assert_eq!(old, model.remove(&key));
                tree = next;
            }
            if i % 500 == 0 {
                versions.push((tree.clone(), model.clone()));
            }
        }

        validate(&tree);
        assert_eq!(tree.len(), model.len());
        assert!(tree.iter().map(|(k, v)| (k.to_vec(), *v)).eq(model.clone()));

        for (tree, model) in versions {
            validate(&tree);
            assert!(tree.iter().map(|(k, v)| (k.to_vec(), *v)).eq(model));
        }
    }
}
