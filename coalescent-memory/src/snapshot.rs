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

use arc_swap::ArcSwap;
use coalescent_radix::{Iter, Root, Tree};

use crate::txn::ReadTxn;

/// Wait-free holder of the currently published tree.
///
/// Every empty tree stored is replaced with one canonical empty instance, which is shared with clones of the cell.
pub struct SnapshotCell<V> {
    current: ArcSwap<Tree<V>>,
    empty: Arc<Tree<V>>,
}

impl<V> Default for SnapshotCell<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Debug for SnapshotCell<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCell")
            .field("current", &Arc::as_ptr(&self.current.load()))
            .field("len", &self.current.load().len())
            .finish()
    }
}

impl<V> Clone for SnapshotCell<V> {
    /// The clone starts from the tree current at clone time and diverges afterwards.
    fn clone(&self) -> Self {
        Self {
            current: ArcSwap::new(self.load()),
            empty: self.empty.clone(),
        }
    }
}

impl<V> SnapshotCell<V> {
    /// Create a cell holding the canonical empty tree.
    pub fn new() -> Self {
        let empty = Arc::new(Tree::new());
        Self {
            current: ArcSwap::new(empty.clone()),
            empty,
        }
    }

    /// Load the current tree.
    pub fn load(&self) -> Arc<Tree<V>> {
        self.current.load_full()
    }

    /// Publish `tree` as the current tree and return the published instance.
    pub fn store(&self, tree: Tree<V>) -> Arc<Tree<V>> {
        let tree = if tree.is_empty() {
            self.empty.clone()
        } else {
            Arc::new(tree)
        };
        self.current.store(tree.clone());
        tree
    }

    /// Returns `true` if `tree` is the canonical empty instance of this cell.
    pub fn is_canonical_empty(&self, tree: &Arc<Tree<V>>) -> bool {
        Arc::ptr_eq(tree, &self.empty)
    }
}

/// Read-only view of the cache frozen at the moment it was taken.
///
/// Later writes to the cache are never observed through a snapshot.
pub struct Snapshot<V> {
    tree: Arc<Tree<V>>,
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self { tree: self.tree.clone() }
    }
}

impl<V> Debug for Snapshot<V>
where
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot").field("tree", &self.tree).finish()
    }
}

impl<V> Snapshot<V> {
    pub(crate) fn new(tree: Arc<Tree<V>>) -> Self {
        Self { tree }
    }

    /// The underlying immutable tree.
    pub fn tree(&self) -> &Tree<V> {
        &self.tree
    }

    /// Returns `true` if both snapshots were taken from the same published version.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree)
    }
}

impl<V> ReadTxn<V> for Snapshot<V> {
    fn get(&self, key: &[u8]) -> Option<&V> {
        self.tree.get(key)
    }

    fn root(&self) -> Root<V> {
        self.tree.root()
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn iter(&self) -> Iter<'_, V> {
        self.tree.iter()
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Iter<'_, V> {
        self.tree.iter_prefix(prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_empty_is_canonical() {
        let cell = SnapshotCell::<u64>::new();
        let empty = cell.load();
        assert!(cell.is_canonical_empty(&empty));

        let (tree, _) = Tree::new().insert(b"k", 1);
        let published = cell.store(tree);
        assert!(!cell.is_canonical_empty(&published));
        assert!(Arc::ptr_eq(&published, &cell.load()));

        let (tree, _) = published.delete(b"k");
        let published = cell.store(tree);
        assert!(Arc::ptr_eq(&published, &empty));
        assert!(Arc::ptr_eq(&cell.load(), &empty));
    }

    #[test]
    fn test_clone_diverges() {
        let cell = SnapshotCell::<u64>::new();
        cell.store(Tree::new().insert(b"a", 1).0);

        let other = cell.clone();
        assert!(Arc::ptr_eq(&cell.load(), &other.load()));

        other.store(other.load().insert(b"b", 2).0);
        assert_eq!(cell.load().get(b"b"), None);
        assert_eq!(other.load().get(b"b"), Some(&2));

        // Both sides share the canonical empty tree.
        let empty = other.store(Tree::new());
        assert!(cell.is_canonical_empty(&empty));
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let cell = SnapshotCell::<u64>::new();
        cell.store(Tree::new().insert(b"a", 1).0);

        let snapshot = Snapshot::new(cell.load());
        cell.store(cell.load().insert(b"a", 2).0);

        assert_eq!(snapshot.get(b"a"), Some(&1));
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.ptr_eq(&Snapshot::new(cell.load())));
    }
}
