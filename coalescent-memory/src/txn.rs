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

use std::sync::Arc;

use coalescent_common::event::Event;
use coalescent_radix::{Iter, Root, Tree, Txn};

/// Read access to one version of the cache.
pub trait ReadTxn<V> {
    /// Get the value under `key`.
    fn get(&self, key: &[u8]) -> Option<&V>;

    /// Returns `true` if an entry exists under `key`.
    fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Handle on the root of the version, for identity comparison.
    fn root(&self) -> Root<V>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns `true` if there are no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over all entries in ascending key order.
    fn iter(&self) -> Iter<'_, V>;

    /// Iterate over the entries whose key starts with `prefix`.
    fn iter_prefix(&self, prefix: &[u8]) -> Iter<'_, V>;
}

/// Read and write access to an in-flight transaction.
pub trait WriteTxn<V>: ReadTxn<V> {
    /// Stage an insertion, returning the value previously visible under `key`.
    fn insert(&mut self, key: &[u8], value: V) -> Option<V>;

    /// Stage a deletion, returning the deleted value.
    fn delete(&mut self, key: &[u8]) -> Option<V>;

    /// Stage the deletion of every entry under `prefix`, returning how many were deleted.
    fn delete_prefix(&mut self, prefix: &[u8]) -> usize;
}

pub(crate) type Garbage<V> = (Event, Box<[u8]>, V);

/// Private working copy of the cache, handed to [`Cache::update`](crate::Cache::update).
///
/// Writes are visible to reads through the same transaction only. Nothing is published unless the update commits.
pub struct Transaction<V> {
    base: Arc<Tree<V>>,
    txn: Txn<V>,
    /// Values of the base version that left the working copy, in the order they left. Only tracked with a listener
    /// installed.
    departed: Option<Vec<(Box<[u8]>, V)>>,
}

impl<V> Transaction<V>
where
    V: Clone,
{
    pub(crate) fn new(base: Arc<Tree<V>>, track: bool) -> Self {
        let txn = base.txn();
        Self {
            base,
            txn,
            departed: track.then(Vec::new),
        }
    }

    /// Returns `true` if the transaction changed anything since it started.
    pub fn is_modified(&self) -> bool {
        self.txn.root() != self.base.root()
    }

    /// Commit the working copy.
    ///
    /// A departed base value is reported as replaced if its key is still present at commit, and as removed otherwise,
    /// however many times the key was written or deleted in between.
    pub(crate) fn into_parts(self) -> (Tree<V>, Vec<Garbage<V>>) {
        let tree = self.txn.commit();
        let garbages = self
            .departed
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let event = if tree.contains_key(&key) {
                    Event::Replace
                } else {
                    Event::Remove
                };
                (event, key, value)
            })
            .collect();
        (tree, garbages)
    }

    /// Returns `true` if the value currently visible under `key` is still the one of the base version.
    fn visible_from_base(&self, key: &[u8]) -> bool {
        match (self.base.get(key), self.txn.get(key)) {
            (Some(base), Some(current)) => std::ptr::eq(base, current),
            _ => false,
        }
    }

    fn track(&mut self, key: &[u8], value: &V, from_base: bool) {
        if let Some(departed) = self.departed.as_mut() {
            if from_base {
                departed.push((key.into(), value.clone()));
            }
        }
    }
}

impl<V> ReadTxn<V> for Transaction<V> {
    fn get(&self, key: &[u8]) -> Option<&V> {
        self.txn.get(key)
    }

    fn root(&self) -> Root<V> {
        self.txn.root()
    }

    fn len(&self) -> usize {
        self.txn.len()
    }

    fn iter(&self) -> Iter<'_, V> {
        self.txn.iter()
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Iter<'_, V> {
        self.txn.iter_prefix(prefix)
    }
}

impl<V> WriteTxn<V> for Transaction<V>
where
    V: Clone,
{
    fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let from_base = self.departed.is_some() && self.visible_from_base(key);
        let old = self.txn.insert(key, value);
        if let Some(old) = old.as_ref() {
            self.track(key, old, from_base);
        }
        old
    }

    fn delete(&mut self, key: &[u8]) -> Option<V> {
        let from_base = self.departed.is_some() && self.visible_from_base(key);
        let old = self.txn.delete(key);
        if let Some(old) = old.as_ref() {
            self.track(key, old, from_base);
        }
        old
    }

    fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        if self.departed.is_none() {
            return self.txn.delete_prefix(prefix);
        }
        let keys: Vec<Box<[u8]>> = self.txn.iter_prefix(prefix).map(|(key, _)| key.into()).collect();
        for key in keys.iter() {
            self.delete(key);
        }
        keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Arc<Tree<u64>> {
        Arc::new([("a", 1), ("b", 2), ("c/1", 3), ("c/2", 4)].into_iter().collect())
    }

    #[test]
    fn test_transaction_reads_own_writes() {
        let base = base();
        let mut txn = Transaction::new(base.clone(), false);
        assert!(!txn.is_modified());

        assert_eq!(txn.insert(b"d", 5), None);
        assert_eq!(txn.delete(b"a"), Some(1));
        assert_eq!(txn.get(b"d"), Some(&5));
        assert!(!txn.contains(b"a"));
        assert_eq!(txn.len(), 4);
        assert!(txn.is_modified());

        assert_eq!(base.get(b"a"), Some(&1));
        assert_eq!(base.get(b"d"), None);

        let (tree, garbages) = txn.into_parts();
        assert!(garbages.is_empty());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_transaction_tracks_only_base_values() {
        let mut txn = Transaction::new(base(), true);

        // Replaces a base value.
        txn.insert(b"a", 10);
        // Replaces a value written by the transaction itself.
        txn.insert(b"a", 100);
        // Removes a value that never left the transaction.
        txn.insert(b"e", 6);
        txn.delete(b"e");
        // Removes base values.
        assert_eq!(txn.delete_prefix(b"c/"), 2);
        assert_eq!(txn.delete(b"missing"), None);

        let (tree, garbages) = txn.into_parts();
        assert_eq!(tree.len(), 2);
        assert_eq!(
            garbages,
            vec![
                (Event::Replace, b"a".to_vec().into_boxed_slice(), 1),
                (Event::Remove, b"c/1".to_vec().into_boxed_slice(), 3),
                (Event::Remove, b"c/2".to_vec().into_boxed_slice(), 4),
            ]
        );
    }

    #[test]
    fn test_transaction_delete_then_reinsert_is_replace() {
        let mut txn = Transaction::new(base(), true);

        assert_eq!(txn.delete(b"a"), Some(1));
        assert_eq!(txn.insert(b"a", 10), None);
        assert_eq!(txn.delete_prefix(b"c/"), 2);
        assert_eq!(txn.insert(b"c/2", 40), None);
        // Deleted again after the reinsertion: the key is gone at commit.
        assert_eq!(txn.delete(b"c/2"), Some(40));
        // Replaced, then deleted: the key is gone at commit.
        assert_eq!(txn.insert(b"b", 20), Some(2));
        assert_eq!(txn.delete(b"b"), Some(20));

        let (tree, garbages) = txn.into_parts();
        assert_eq!(tree.get(b"a"), Some(&10));
        assert_eq!(tree.len(), 1);
        assert_eq!(
            garbages,
            vec![
                (Event::Replace, b"a".to_vec().into_boxed_slice(), 1),
                (Event::Remove, b"c/1".to_vec().into_boxed_slice(), 3),
                (Event::Remove, b"c/2".to_vec().into_boxed_slice(), 4),
                (Event::Remove, b"b".to_vec().into_boxed_slice(), 2),
            ]
        );
    }

    #[test]
    fn test_transaction_without_writes_keeps_root() {
        let base = base();
        let mut txn = Transaction::new(base.clone(), true);
        assert_eq!(txn.delete(b"missing"), None);
        assert_eq!(txn.delete_prefix(b"zzz"), 0);
        assert_eq!(txn.root(), base.root());
        assert!(!txn.is_modified());
    }
}
