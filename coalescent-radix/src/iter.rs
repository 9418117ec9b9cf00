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

use crate::node::Node;

/// Iterator over the entries of a tree in ascending key order.
///
/// Created by [`Tree::iter`](crate::Tree::iter), [`Tree::iter_prefix`](crate::Tree::iter_prefix) and their
/// [`Txn`](crate::Txn) counterparts.
pub struct Iter<'a, V> {
    stack: Vec<&'a Node<V>>,
}

impl<'a, V> Iter<'a, V> {
    pub(crate) fn new(node: Option<&'a Node<V>>) -> Self {
        Self {
            stack: node.into_iter().collect(),
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        // Pre-order walk: a node's own key is a prefix of (and so sorts before) every key below it.
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.edges.iter().rev().map(|edge| &*edge.node));
            if let Some(leaf) = node.leaf.as_deref() {
                return Some((&*leaf.key, &leaf.value));
            }
        }
        None
    }
}

impl<V> std::iter::FusedIterator for Iter<'_, V> {}
