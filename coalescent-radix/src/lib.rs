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

//! Persistent radix tree keyed by byte strings.
//!
//! Every [`Tree`] is immutable. Mutations either return a new tree ([`Tree::insert`], [`Tree::delete`]) or go
//! through a [`Txn`], a private working copy that is turned into a new tree by [`Txn::commit`]. Unchanged nodes are
//! shared between versions, so holding an old tree costs only the nodes that were replaced since.
//!
//! Nodes are reference counted. A transaction copies a node the first time it writes to it while the node is still
//! reachable from another tree, and mutates nodes it created itself in place.

mod iter;
mod node;
mod tree;
mod txn;

pub use iter::Iter;
pub use tree::{Root, Tree};
pub use txn::Txn;
