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

use crate::code::Value;

/// Reason for an entry leaving the current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The value was overwritten by an insertion under the same key.
    Replace,
    /// The entry was deleted.
    Remove,
    /// The cache was cleared.
    Clear,
}

/// Trait for the customized event listener.
///
/// Listeners are called after the write lock has been released, so they may call back into the cache.
/// Entries staged by a rolled back update are never reported.
pub trait EventListener: Send + Sync + 'static {
    /// Associated value type.
    type Value;

    /// Called when an entry leaves the current snapshot of the cache with the reason.
    ///
    /// Older snapshots still held by readers keep observing the entry.
    #[expect(unused_variables)]
    fn on_leave(&self, reason: Event, key: &[u8], value: &Self::Value)
    where
        Self::Value: Value,
    {
    }
}
