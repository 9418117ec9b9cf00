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

use std::{
    borrow::Cow,
    convert::Infallible,
    fmt::Debug,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use coalescent_common::{
    code::Value,
    error::{Error, Result},
    event::{Event, EventListener},
    metrics::{registry::noop::NoopMetricsRegistry, Metrics, RegistryOps},
};
use coalescent_radix::Tree;
use parking_lot::Mutex;

use crate::{
    snapshot::{Snapshot, SnapshotCell},
    txn::{Garbage, Transaction},
};

/// Outcome of [`Cache::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<V> {
    /// The key was already present, possibly inserted by a concurrent caller.
    Hit(V),
    /// The value was created by this call and published.
    Created(V),
}

impl<V> Fetched<V> {
    /// Returns `true` if the value was already cached.
    pub fn is_hit(&self) -> bool {
        matches!(self, Fetched::Hit(_))
    }

    /// Returns `true` if the value was created by this call.
    pub fn is_created(&self) -> bool {
        matches!(self, Fetched::Created(_))
    }

    /// Borrow the value.
    pub fn value(&self) -> &V {
        match self {
            Fetched::Hit(value) | Fetched::Created(value) => value,
        }
    }

    /// Take the value.
    pub fn into_value(self) -> V {
        match self {
            Fetched::Hit(value) | Fetched::Created(value) => value,
        }
    }
}

/// In-memory cache builder.
pub struct CacheBuilder<V> {
    name: Cow<'static, str>,
    event_listener: Option<Arc<dyn EventListener<Value = V>>>,
    registry: Arc<dyn RegistryOps>,
}

impl<V> Default for CacheBuilder<V>
where
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> CacheBuilder<V>
where
    V: Value,
{
    /// Create a cache builder with the default configuration.
    pub fn new() -> Self {
        Self {
            name: "coalescent".into(),
            event_listener: None,
            registry: Arc::new(NoopMetricsRegistry),
        }
    }

    /// Set the name of the cache instance.
    ///
    /// The name is used as the `name` label of the metrics and in logs.
    ///
    /// Default: `coalescent`.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set event listener.
    ///
    /// Default: No event listener installed.
    pub fn with_event_listener(mut self, event_listener: Arc<dyn EventListener<Value = V>>) -> Self {
        self.event_listener = Some(event_listener);
        self
    }

    /// Set metrics registry.
    ///
    /// Default: [`NoopMetricsRegistry`].
    pub fn with_metrics_registry(mut self, registry: impl RegistryOps) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Build the cache with the given configuration.
    pub fn build(self) -> Cache<V> {
        let metrics = Metrics::new(self.name.clone(), &*self.registry);
        Cache {
            cell: SnapshotCell::new(),
            lock: Mutex::new(()),
            name: self.name,
            metrics,
            registry: self.registry,
            forks: Arc::default(),
            event_listener: self.event_listener,
        }
    }
}

/// Concurrent cache keyed by byte strings.
///
/// Reads load the current snapshot without locking and never block. Writers are serialized by a mutex, build the next
/// snapshot from the current one and publish it atomically, so a reader observes a write entirely or not at all.
///
/// Cloning a cache forks it: the clone starts from the current snapshot, has its own write lock, and writes on either
/// side are never visible to the other. Share a cache between threads with an [`Arc`] instead.
///
/// A fork reports to the same metrics registry under its own name, `<name>-fork-<n>`, where `n` counts the forks
/// taken from the original cache and its forks.
pub struct Cache<V>
where
    V: Value,
{
    cell: SnapshotCell<V>,
    lock: Mutex<()>,

    name: Cow<'static, str>,
    metrics: Metrics,
    registry: Arc<dyn RegistryOps>,
    forks: Arc<AtomicUsize>,
    event_listener: Option<Arc<dyn EventListener<Value = V>>>,
}

impl<V> Debug for Cache<V>
where
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("snapshot", &self.cell)
            .finish()
    }
}

impl<V> Default for Cache<V>
where
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Cache<V>
where
    V: Value,
{
    fn clone(&self) -> Self {
        let fork = self.forks.fetch_add(1, Ordering::Relaxed) + 1;
        let name: Cow<'static, str> = format!("{}-fork-{fork}", self.name).into();

        let cell = self.cell.clone();
        let metrics = Metrics::new(name.clone(), &*self.registry);
        metrics.memory_entries.absolute(cell.load().len() as u64);

        Self {
            cell,
            lock: Mutex::new(()),
            name,
            metrics,
            registry: self.registry.clone(),
            forks: self.forks.clone(),
            event_listener: self.event_listener.clone(),
        }
    }
}

impl<V> Cache<V>
where
    V: Value,
{
    /// Create an empty cache with the default configuration.
    pub fn new() -> Self {
        CacheBuilder::new().build()
    }

    /// Name of the cache instance.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Metrics of the cache instance.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get a clone of the value under `key`.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::get"))]
    pub fn get(&self, key: &[u8]) -> Option<V> {
        let value = self.cell.load().get(key).cloned();
        match value {
            Some(_) => self.metrics.memory_hit.increase(1),
            None => self.metrics.memory_miss.increase(1),
        }
        value
    }

    /// Returns `true` if an entry exists under `key`.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::contains"))]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.cell.load().contains_key(key)
    }

    /// Number of entries in the current snapshot.
    pub fn len(&self) -> usize {
        self.cell.load().len()
    }

    /// Returns `true` if the current snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.cell.load().is_empty()
    }

    /// Take a read-only snapshot of the cache.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::snapshot"))]
    pub fn snapshot(&self) -> Snapshot<V> {
        Snapshot::new(self.cell.load())
    }

    /// Call `f` with a snapshot of the cache and return its result.
    ///
    /// All reads inside `f` observe the same version.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::view"))]
    pub fn view<T>(&self, f: impl FnOnce(&Snapshot<V>) -> T) -> T {
        f(&self.snapshot())
    }

    /// Insert an entry, returning the value it replaced.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::insert"))]
    pub fn insert(&self, key: &[u8], value: V) -> Option<V> {
        let old = self.write(|| {
            let (tree, old) = self.cell.load().insert(key, value);
            self.publish(tree);
            old
        });

        match old.as_ref() {
            Some(old) => {
                self.metrics.memory_replace.increase(1);
                self.notify(Event::Replace, key, old);
            }
            None => self.metrics.memory_insert.increase(1),
        }
        old
    }

    /// Delete an entry, returning its value.
    ///
    /// Deleting an absent key publishes nothing.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::delete"))]
    pub fn delete(&self, key: &[u8]) -> Option<V> {
        let old = self.write(|| {
            let (tree, old) = self.cell.load().delete(key);
            if old.is_some() {
                self.publish(tree);
            }
            old
        });

        if let Some(old) = old.as_ref() {
            self.metrics.memory_remove.increase(1);
            self.notify(Event::Remove, key, old);
        }
        old
    }

    /// Delete the entry under `key` only if `predicate` accepts its current value.
    ///
    /// `predicate` runs under the write lock and is not called if the key is absent. Returns `true` if the entry was
    /// deleted.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::delete_if"))]
    pub fn delete_if(&self, key: &[u8], predicate: impl FnOnce(&V) -> bool) -> bool {
        let old = self.write(|| {
            let current = self.cell.load();
            if !current.get(key).is_some_and(predicate) {
                return None;
            }
            let (tree, old) = current.delete(key);
            self.publish(tree);
            old
        });

        match old {
            Some(old) => {
                self.metrics.memory_remove.increase(1);
                self.notify(Event::Remove, key, &old);
                true
            }
            None => false,
        }
    }

    /// Get the value under `key`, creating it with `init` if absent.
    ///
    /// Concurrent callers racing on the same absent key are serialized by the write lock. Only the first one calls
    /// `init`; the others observe the value it published. `init` runs under the write lock and should be fast.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::fetch"))]
    pub fn fetch(&self, key: &[u8], init: impl FnOnce() -> V) -> Fetched<V> {
        match self.fetch_inner(key, || Ok::<_, Infallible>(init())) {
            Ok(fetched) => fetched,
            Err(e) => match e {},
        }
    }

    /// Fallible version of [`Cache::fetch`].
    ///
    /// If `init` fails nothing is published and the error is returned with [`ErrorKind::External`].
    ///
    /// [`ErrorKind::External`]: coalescent_common::error::ErrorKind::External
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::try_fetch"))]
    pub fn try_fetch<ER>(&self, key: &[u8], init: impl FnOnce() -> std::result::Result<V, ER>) -> Result<Fetched<V>>
    where
        ER: Into<anyhow::Error>,
    {
        self.fetch_inner(key, init).map_err(|e| {
            let e = Error::external("fetch init failed", e)
                .with_context("cache", &self.name)
                .with_context("key_len", key.len());
            tracing::debug!("[cache]: {e}");
            e
        })
    }

    fn fetch_inner<ER>(
        &self,
        key: &[u8],
        init: impl FnOnce() -> std::result::Result<V, ER>,
    ) -> std::result::Result<Fetched<V>, ER> {
        let observed = self.cell.load();
        if let Some(value) = observed.get(key) {
            self.metrics.memory_hit.increase(1);
            return Ok(Fetched::Hit(value.clone()));
        }
        self.metrics.memory_miss.increase(1);

        self.write(|| {
            let current = self.cell.load();
            // `observed` is still alive here, so equal pointers mean no writer published in between.
            if !Arc::ptr_eq(&observed, &current) {
                if let Some(value) = current.get(key) {
                    self.metrics.memory_queue.increase(1);
                    return Ok(Fetched::Hit(value.clone()));
                }
            }
            drop(observed);

            let value = init()?;
            let (tree, _) = current.insert(key, value.clone());
            self.publish(tree);
            self.metrics.memory_fetch.increase(1);
            Ok(Fetched::Created(value))
        })
    }

    /// Apply a batch of changes atomically.
    ///
    /// `f` runs under the write lock on a private [`Transaction`] started from the current snapshot. If it returns
    /// `true` the transaction is committed and published as one new snapshot. If it returns `false` every staged
    /// change is discarded and the current snapshot stays in place.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::update"))]
    pub fn update(&self, f: impl FnOnce(&mut Transaction<V>) -> bool) -> bool {
        match self.update_inner(|txn| Ok::<_, Infallible>(f(txn))) {
            Ok(committed) => committed,
            Err(e) => match e {},
        }
    }

    /// Fallible version of [`Cache::update`].
    ///
    /// An error rolls the transaction back exactly like `Ok(false)` and is returned with [`ErrorKind::External`].
    ///
    /// [`ErrorKind::External`]: coalescent_common::error::ErrorKind::External
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::try_update"))]
    pub fn try_update<ER>(&self, f: impl FnOnce(&mut Transaction<V>) -> std::result::Result<bool, ER>) -> Result<bool>
    where
        ER: Into<anyhow::Error>,
    {
        self.update_inner(f)
            .map_err(|e| Error::external("update aborted", e).with_context("cache", &self.name))
    }

    fn update_inner<ER>(
        &self,
        f: impl FnOnce(&mut Transaction<V>) -> std::result::Result<bool, ER>,
    ) -> std::result::Result<bool, ER> {
        let res = self.write(|| {
            let mut txn = Transaction::new(self.cell.load(), self.event_listener.is_some());
            if !f(&mut txn)? {
                return Ok(None);
            }
            let modified = txn.is_modified();
            let (tree, garbages) = txn.into_parts();
            if modified {
                self.publish(tree);
            }
            Ok(Some(garbages))
        });

        match res {
            Ok(Some(garbages)) => {
                self.metrics.memory_commit.increase(1);
                self.notify_all(garbages);
                Ok(true)
            }
            Ok(None) => {
                self.metrics.memory_rollback.increase(1);
                tracing::debug!(name = %self.name, "[cache]: update rolled back");
                Ok(false)
            }
            Err(e) => {
                self.metrics.memory_rollback.increase(1);
                tracing::debug!(name = %self.name, "[cache]: update rolled back on error");
                Err(e)
            }
        }
    }

    /// Remove every entry.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "coalescent::memory::cache::clear"))]
    pub fn clear(&self) {
        let old = self.write(|| {
            let old = self.cell.load();
            self.publish(Tree::new());
            old
        });

        self.metrics.memory_clear.increase(1);
        if let Some(listener) = self.event_listener.as_ref() {
            for (key, value) in old.iter() {
                listener.on_leave(Event::Clear, key, value);
            }
        }
    }

    /// Run `f` while holding the write lock.
    ///
    /// The guard is released on unwind, so a panicking callback never leaves the lock held.
    fn write<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.lock.lock();
        let start = Instant::now();
        let res = f();
        self.metrics
            .memory_write_duration
            .record(start.elapsed().as_secs_f64());
        res
    }

    /// Must be called with the write lock held.
    fn publish(&self, tree: Tree<V>) {
        let tree = self.cell.store(tree);
        self.metrics.memory_entries.absolute(tree.len() as u64);
        tracing::trace!(name = %self.name, len = tree.len(), "[cache]: snapshot published");
    }

    fn notify(&self, event: Event, key: &[u8], value: &V) {
        if let Some(listener) = self.event_listener.as_ref() {
            listener.on_leave(event, key, value);
        }
    }

    fn notify_all(&self, garbages: Vec<Garbage<V>>) {
        if let Some(listener) = self.event_listener.as_ref() {
            for (event, key, value) in garbages {
                listener.on_leave(event, &key, &value);
            }
        }
    }
}
