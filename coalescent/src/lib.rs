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

//! coalescent: a concurrent cache keyed by byte strings, built on a persistent radix tree.
//!
//! Reads never take a lock. Writes are serialized and publish a new immutable snapshot atomically, so readers observe
//! every write entirely or not at all. Concurrent [`Cache::fetch`] calls on the same absent key create the value once.
//!
//! ```
//! use coalescent::{Cache, WriteTxn};
//!
//! let cache: Cache<u64> = Cache::new();
//! cache.insert(b"a", 1);
//! assert_eq!(cache.get(b"a"), Some(1));
//!
//! let fetched = cache.fetch(b"b", || 2);
//! assert!(fetched.is_created());
//!
//! let committed = cache.update(|txn| {
//!     txn.delete(b"a");
//!     txn.insert(b"c", 3);
//!     true
//! });
//! assert!(committed);
//! assert_eq!(cache.len(), 2);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use coalescent_common as common;
pub use coalescent_memory as memory;
pub use coalescent_radix as radix;

mod prelude;
pub use prelude::*;
