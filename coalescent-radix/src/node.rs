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

use coalescent_common::{strict_assert, strict_assert_eq};

/// Key and value stored in a tree.
///
/// Leaves are shared between tree versions, so replacing a node never copies the value.
#[derive(Debug)]
pub(crate) struct Leaf<V> {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: V,
}

impl<V> Leaf<V> {
    pub(crate) fn new(key: &[u8], value: V) -> Arc<Self> {
        Arc::new(Self { key: key.into(), value })
    }
}

/// Take the value out of a leaf, cloning it only if another tree still references the leaf.
pub(crate) fn into_value<V: Clone>(leaf: Arc<Leaf<V>>) -> V {
    Arc::try_unwrap(leaf)
        .map(|leaf| leaf.value)
        .unwrap_or_else(|leaf| leaf.value.clone())
}

pub(crate) struct Edge<V> {
    /// First byte of `node.prefix`.
    pub(crate) label: u8,
    pub(crate) node: Arc<Node<V>>,
}

impl<V> Clone for Edge<V> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            node: self.node.clone(),
        }
    }
}

/// Radix tree node.
///
/// All nodes but the root have a non-empty `prefix`. Edges are sorted by label.
pub(crate) struct Node<V> {
    pub(crate) prefix: Box<[u8]>,
    pub(crate) leaf: Option<Arc<Leaf<V>>>,
    pub(crate) edges: Vec<Edge<V>>,
}

// Shallow: children and leaves stay shared.
impl<V> Clone for Node<V> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            leaf: self.leaf.clone(),
            edges: self.edges.clone(),
        }
    }
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            prefix: Box::default(),
            leaf: None,
            edges: vec![],
        }
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

impl<V> Node<V> {
    fn with_leaf(prefix: &[u8], leaf: Arc<Leaf<V>>) -> Self {
        Self {
            prefix: prefix.into(),
            leaf: Some(leaf),
            edges: vec![],
        }
    }

    fn edge_index(&self, label: u8) -> Result<usize, usize> {
        self.edges.binary_search_by_key(&label, |edge| edge.label)
    }

    pub(crate) fn child(&self, label: u8) -> Option<&Arc<Node<V>>> {
        self.edge_index(label).ok().map(|idx| &self.edges[idx].node)
    }

    fn add_edge(&mut self, node: Arc<Node<V>>) {
        let label = node.prefix[0];
        match self.edge_index(label) {
            Ok(idx) => self.edges[idx] = Edge { label, node },
            Err(idx) => self.edges.insert(idx, Edge { label, node }),
        }
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<&Leaf<V>> {
        let mut node = self;
        let mut search = key;
        loop {
            let Some(&label) = search.first() else {
                return node.leaf.as_deref();
            };
            let child = node.child(label)?;
            search = search.strip_prefix(&*child.prefix)?;
            node = child;
        }
    }

    /// Find the node whose subtree holds exactly the keys starting with `prefix`.
    pub(crate) fn seek_prefix(&self, prefix: &[u8]) -> Option<&Node<V>> {
        let mut node = self;
        let mut search = prefix;
        loop {
            let Some(&label) = search.first() else {
                return Some(node);
            };
            let child = node.child(label)?;
            if let Some(rest) = search.strip_prefix(&*child.prefix) {
                search = rest;
                node = child;
            } else if child.prefix.starts_with(search) {
                return Some(child);
            } else {
                return None;
            }
        }
    }

    pub(crate) fn longest_prefix(&self, key: &[u8]) -> Option<&Leaf<V>> {
        let mut node = self;
        let mut search = key;
        let mut last = None;
        loop {
            if let Some(leaf) = node.leaf.as_deref() {
                last = Some(leaf);
            }
            let Some(child) = search.first().and_then(|&label| node.child(label)) else {
                return last;
            };
            match search.strip_prefix(&*child.prefix) {
                Some(rest) => {
                    search = rest;
                    node = child;
                }
                None => return last,
            }
        }
    }

    pub(crate) fn first(&self) -> Option<&Leaf<V>> {
        let mut node = self;
        loop {
            if let Some(leaf) = node.leaf.as_deref() {
                return Some(leaf);
            }
            node = &node.edges.first()?.node;
        }
    }

    pub(crate) fn last(&self) -> Option<&Leaf<V>> {
        let mut node = self;
        while let Some(edge) = node.edges.last() {
            node = &edge.node;
        }
        node.leaf.as_deref()
    }

    /// Insert `key` below `this`, where `key[..depth]` has already been matched.
    ///
    /// Returns the replaced leaf.
    pub(crate) fn insert(this: &mut Arc<Self>, key: &[u8], depth: usize, value: V) -> Option<Arc<Leaf<V>>> {
        let node = Arc::make_mut(this);
        let search = &key[depth..];

        let Some(&label) = search.first() else {
            return node.leaf.replace(Leaf::new(key, value));
        };

        let idx = match node.edge_index(label) {
            Ok(idx) => idx,
            Err(idx) => {
                let child = Node::with_leaf(search, Leaf::new(key, value));
                node.edges.insert(
                    idx,
                    Edge {
                        label,
                        node: Arc::new(child),
                    },
                );
                return None;
            }
        };

        let common = common_prefix_len(search, &node.edges[idx].node.prefix);
        if common == node.edges[idx].node.prefix.len() {
            return Self::insert(&mut node.edges[idx].node, key, depth + common, value);
        }

        // The key diverges inside the child prefix: split the child at `common`.
        strict_assert!(common > 0);
        let mut existing = std::mem::take(&mut node.edges[idx].node);
        {
            let existing = Arc::make_mut(&mut existing);
            existing.prefix = existing.prefix[common..].into();
        }

        let mut split = Node {
            prefix: search[..common].into(),
            leaf: None,
            edges: Vec::with_capacity(2),
        };
        split.add_edge(existing);

        let rest = &search[common..];
        if rest.is_empty() {
            split.leaf = Some(Leaf::new(key, value));
        } else {
            split.add_edge(Arc::new(Node::with_leaf(rest, Leaf::new(key, value))));
        }

        node.edges[idx].node = Arc::new(split);
        None
    }

    /// Remove `key` below `this`, where `key[..depth]` has already been matched.
    ///
    /// Every node on the path is made unique before the key is known to exist, so callers must check presence first
    /// if they want a miss to leave shared nodes untouched.
    pub(crate) fn remove(this: &mut Arc<Self>, key: &[u8], depth: usize) -> Option<Arc<Leaf<V>>> {
        let node = Arc::make_mut(this);
        let search = &key[depth..];

        let Some(&label) = search.first() else {
            return node.leaf.take();
        };

        let idx = node.edge_index(label).ok()?;
        let matched = node.edges[idx].node.prefix.len();
        if !search.starts_with(&node.edges[idx].node.prefix) {
            return None;
        }
        let leaf = Self::remove(&mut node.edges[idx].node, key, depth + matched)?;

        let child = &node.edges[idx].node;
        if child.leaf.is_none() {
            match child.edges.len() {
                0 => {
                    node.edges.remove(idx);
                }
                1 => Arc::make_mut(&mut node.edges[idx].node).merge_only_child(),
                _ => {}
            }
        }

        Some(leaf)
    }

    /// Absorb the single child of a leafless node, concatenating the prefixes.
    fn merge_only_child(&mut self) {
        strict_assert!(self.leaf.is_none());
        strict_assert_eq!(self.edges.len(), 1);

        let Some(edge) = self.edges.pop() else {
            return;
        };
        let child = Arc::unwrap_or_clone(edge.node);

        let mut prefix = Vec::with_capacity(self.prefix.len() + child.prefix.len());
        prefix.extend_from_slice(&self.prefix);
        prefix.extend_from_slice(&child.prefix);

        self.prefix = prefix.into_boxed_slice();
        self.leaf = child.leaf;
        self.edges = child.edges;
    }

    #[cfg(test)]
    pub(crate) fn validate(&self, is_root: bool) -> usize {
        if is_root {
            assert!(self.prefix.is_empty());
        } else {
            assert!(!self.prefix.is_empty());
            assert!(
                self.leaf.is_some() || self.edges.len() >= 2,
                "leafless inner node with {} edges",
                self.edges.len()
            );
        }
        for pair in self.edges.windows(2) {
            assert!(pair[0].label < pair[1].label);
        }
        let mut leaves = usize::from(self.leaf.is_some());
        for edge in self.edges.iter() {
            assert_eq!(edge.label, edge.node.prefix[0]);
            leaves += edge.node.validate(false);
        }
        leaves
    }
}
