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

use itertools::Itertools;

use crate::{
    iter::Iter,
    node::{into_value, Node},
    tree::{Root, Tree},
};

/// Batch of modifications on top of a [`Tree`].
///
/// Nodes that a transaction copied are owned by it alone and are modified in place by later writes, so a batch of
/// `n` writes does not pay for `n` full path copies. The base tree is never observed to change.
pub struct Txn<V> {
    root: Arc<Node<V>>,
    len: usize,
}

impl<V> Txn<V> {
    pub(crate) fn new(root: Arc<Node<V>>, len: usize) -> Self {
        Self { root, len }
    }

    /// Get the value under `key` as of the writes made so far.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.root.get(key).map(|leaf| &leaf.value)
    }

    /// Returns `true` if an entry exists under `key`.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.root.get(key).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the transaction holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Handle on the current root node.
    ///
    /// Holding the handle makes the next write copy the root again.
    pub fn root(&self) -> Root<V> {
        Root(self.root.clone())
    }

    /// Iterate over all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(Some(&*self.root))
    }

    /// Iterate over the entries whose key starts with `prefix`.
    pub fn iter_prefix(&self, prefix: &[u8]) -> Iter<'_, V> {
        Iter::new(self.root.seek_prefix(prefix))
    }

    /// Finish the transaction.
    pub fn commit(self) -> Tree<V> {
        Tree {
            root: self.root,
            len: self.len,
        }
    }
}

impl<V> Txn<V>
where
    V: Clone,
{
    /// Insert an entry, returning the value previously stored under `key`.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let old = Node::insert(&mut self.root, key, 0, value).map(into_value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    /// Delete an entry, returning its value.
    ///
    /// Deleting an absent key leaves the root untouched.
    pub fn delete(&mut self, key: &[u8]) -> Option<V> {
        if !self.contains_key(key) {
            return None;
        }
        let old = Node::remove(&mut self.root, key, 0).map(into_value);
        if old.is_some() {
            self.len -= 1;
        }
        old
    }

    /// Delete every entry whose key starts with `prefix`, returning how many were deleted.
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let keys = self.iter_prefix(prefix).map(|(key, _)| key.to_vec()).collect_vec();
        for key in keys.iter() {
            self.delete(key);
        }
        keys.len()
    }
}
