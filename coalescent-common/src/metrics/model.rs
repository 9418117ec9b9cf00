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

use std::borrow::Cow;

use super::{BoxedCounter, BoxedGauge, BoxedHistogram, RegistryOps};

/// Metrics of one cache instance.
///
/// Every metric carries the `name` label of the cache, so caches sharing a registry stay distinguishable.
#[derive(Debug)]
pub struct Metrics {
    /// Insertions of a new key.
    pub memory_insert: BoxedCounter,
    /// Insertions overwriting an existing key.
    pub memory_replace: BoxedCounter,
    /// Lookups that found the key.
    pub memory_hit: BoxedCounter,
    /// Lookups that missed the key.
    pub memory_miss: BoxedCounter,
    /// Entries deleted by `delete` or `delete_if`.
    pub memory_remove: BoxedCounter,
    /// Entries created by `fetch`.
    pub memory_fetch: BoxedCounter,
    /// Fetches satisfied by the re-check under the write lock.
    pub memory_queue: BoxedCounter,
    /// Committed updates.
    pub memory_commit: BoxedCounter,
    /// Rolled back updates.
    pub memory_rollback: BoxedCounter,
    /// Clears.
    pub memory_clear: BoxedCounter,

    /// Entry count of the current snapshot.
    pub memory_entries: BoxedGauge,

    /// Seconds spent holding the write lock.
    pub memory_write_duration: BoxedHistogram,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new(name: impl Into<Cow<'static, str>>, registry: &dyn RegistryOps) -> Self {
        let name = name.into();

        let op_total = registry.register_counter_vec(
            "coalescent_op_total".into(),
            "coalescent cache operations".into(),
            &["name", "op"],
        );
        let entries = registry.register_gauge_vec(
            "coalescent_entries".into(),
            "coalescent entries in the current snapshot".into(),
            &["name"],
        );
        let write_duration = registry.register_histogram_vec(
            "coalescent_write_duration".into(),
            "coalescent write lock hold durations".into(),
            &["name"],
        );

        let op = |op: &'static str| op_total.counter(&[name.clone(), op.into()]);

        Self {
            memory_insert: op("insert"),
            memory_replace: op("replace"),
            memory_hit: op("hit"),
            memory_miss: op("miss"),
            memory_remove: op("remove"),
            memory_fetch: op("fetch"),
            memory_queue: op("queue"),
            memory_commit: op("commit"),
            memory_rollback: op("rollback"),
            memory_clear: op("clear"),
            memory_entries: entries.gauge(&[name.clone()]),
            memory_write_duration: write_duration.histogram(&[name]),
        }
    }
}
