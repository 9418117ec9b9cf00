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

//! In-memory snapshot cache for coalescent.
//!
//! The cache publishes immutable versions of a persistent radix tree through an atomically swapped pointer. Readers
//! load the current version without locking. Writers are serialized by one mutex and publish a new version only after
//! the whole write, or the whole transaction, has been applied.

mod cache;
mod prelude;
mod snapshot;
mod txn;

pub use prelude::*;
