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

//! Fuzzy test for coalescent cache.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

use coalescent::{Cache, CacheBuilder, Event, EventListener, ReadTxn, WriteTxn};
use itertools::Itertools;
use rand::{rng, Rng};

const WRITERS: usize = 4;
const UPDATERS: usize = 2;
const FETCHERS: usize = 8;
const READERS: usize = 8;

const WRITES: u64 = 2000;
const UPDATES: usize = 300;
const FETCHES: usize = 2000;
const READS: usize = 2000;

const DUPLICATES: u64 = 10;
const BATCH: u64 = 16;

const INTERVAL: usize = 500;

#[derive(Debug)]
struct RecentLeaveQueue {
    queue: RwLock<VecDeque<u64>>,
    capacity: usize,
    leaves: AtomicU64,
}

impl EventListener for RecentLeaveQueue {
    type Value = Vec<u8>;

    fn on_leave(&self, _: Event, key: &[u8], value: &Self::Value) {
        let key = decode(key);
        assert_eq!(value, &value_of(key));

        self.leaves.fetch_add(1, Ordering::Relaxed);
        let mut queue = self.queue.write().unwrap();
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(key);
    }
}

impl RecentLeaveQueue {
    fn new(capacity: usize) -> Self {
        Self {
            queue: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            leaves: AtomicU64::new(0),
        }
    }

    fn pick(&self) -> Option<u64> {
        let queue = self.queue.read().unwrap();
        if queue.is_empty() {
            return None;
        }
        let index = rng().random_range(0..queue.len());
        Some(queue[index])
    }
}

fn encode(key: u64) -> [u8; 8] {
    key.to_be_bytes()
}

fn decode(key: &[u8]) -> u64 {
    u64::from_be_bytes(key.try_into().unwrap())
}

fn value_of(key: u64) -> Vec<u8> {
    vec![key as u8; 64 + (key % 64) as usize]
}

fn write(cache: &Cache<Vec<u8>>, idx: &AtomicU64) {
    loop {
        let key = idx.fetch_add(1, Ordering::Relaxed);
        if key > WRITES {
            break;
        }
        if key % INTERVAL as u64 == 0 {
            tracing::info!("Inserted {key} items");
        }
        for k in key.saturating_sub(DUPLICATES)..=key {
            cache.insert(&encode(k), value_of(k));
        }
        if rng().random_bool(0.2) {
            let k = rng().random_range(0..=key);
            cache.delete_if(&encode(k), |v| v.len() % 2 == 0);
        }
    }
}

fn update(cache: &Cache<Vec<u8>>) {
    for i in 0..UPDATES {
        let base = rng().random_range(0..WRITES);
        let commit = rng().random_bool(0.7);
        let committed = cache.update(|txn| {
            for k in base..base + BATCH {
                txn.insert(&encode(k), value_of(k));
            }
            if rng().random_bool(0.5) {
                txn.delete(&encode(base));
            }
            commit
        });
        assert_eq!(committed, commit);
        if i % 100 == 0 {
            tracing::info!("Applied {i} updates");
        }
    }
}

fn fetch(cache: &Cache<Vec<u8>>, recent: &RecentLeaveQueue) {
    let mut cnt = 0;
    while cnt < FETCHES {
        let key = match recent.pick() {
            Some(key) => key,
            None => rng().random_range(0..WRITES),
        };
        let fetched = cache.fetch(&encode(key), || value_of(key));
        assert_eq!(fetched.value(), &value_of(key));
        cnt += 1;
        if cnt % INTERVAL == 0 {
            tracing::info!("Fetched {cnt} items");
        }
    }
}

fn read(cache: &Cache<Vec<u8>>) {
    for cnt in 1..=READS {
        let key = rng().random_range(0..WRITES);
        if let Some(value) = cache.get(&encode(key)) {
            assert_eq!(value, value_of(key));
        }

        if cnt % 50 == 0 {
            // Every snapshot is sorted and holds only consistent values.
            let keys = cache.view(|snapshot| {
                snapshot
                    .iter()
                    .map(|(k, v)| {
                        let key = decode(k);
                        assert_eq!(v, &value_of(key));
                        key
                    })
                    .collect_vec()
            });
            assert!(keys.iter().tuple_windows().all(|(a, b)| a < b));
        }
        if cnt % INTERVAL == 0 {
            tracing::info!("Read {cnt} items");
        }
    }
}

#[test_log::test]
fn test_concurrent_write_update_fetch_and_read() {
    let recent = Arc::new(RecentLeaveQueue::new(16));
    let cache: Cache<Vec<u8>> = CacheBuilder::new()
        .with_name("test")
        .with_event_listener(recent.clone())
        .build();
    let idx = AtomicU64::new(0);

    std::thread::scope(|s| {
        for _ in 0..WRITERS {
            s.spawn(|| write(&cache, &idx));
        }
        for _ in 0..UPDATERS {
            s.spawn(|| update(&cache));
        }
        for _ in 0..FETCHERS {
            s.spawn(|| fetch(&cache, &recent));
        }
        for _ in 0..READERS {
            s.spawn(|| read(&cache));
        }
    });

    // Duplicated inserts replace values, so the listener must have heard about them.
    assert!(recent.leaves.load(Ordering::Relaxed) > 0);
    cache.view(|snapshot| {
        assert_eq!(snapshot.len(), snapshot.iter().count());
        for (k, v) in snapshot.iter() {
            assert_eq!(v, &value_of(decode(k)));
        }
    });
}

#[test_log::test]
fn test_forks_diverge_under_concurrency() {
    let origin: Cache<Vec<u8>> = Cache::new();
    for k in 0..100 {
        origin.insert(&encode(k), value_of(k));
    }
    let fork = origin.clone();

    std::thread::scope(|s| {
        s.spawn(|| {
            for k in 100..200 {
                origin.insert(&encode(k), value_of(k));
            }
        });
        s.spawn(|| {
            for k in 0..50 {
                fork.delete(&encode(k));
            }
        });
    });

    assert_eq!(origin.len(), 200);
    assert_eq!(fork.len(), 50);
    assert!(origin.contains(&encode(0)));
    assert!(!fork.contains(&encode(0)));
    assert!(!fork.contains(&encode(150)));
}
