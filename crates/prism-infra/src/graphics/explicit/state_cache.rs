// Copyright 2025 eraflo
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

//! Hash-keyed caches of native objects.
//!
//! Keys are 64-bit content hashes of the logical description. A cache holds at
//! most one native object per key. Invalidation never destroys anything: the
//! drained objects are handed back so the caller can route them through the
//! deferred-release queue, because in-flight command buffers may still use them.

use ahash::AHashMap;

/// An unbounded cache from content hash to native object.
#[derive(Debug)]
pub struct StateCache<T: Copy> {
    entries: AHashMap<u64, T>,
    generation: u32,
}

impl<T: Copy> Default for StateCache<T> {
    fn default() -> Self {
        Self {
            entries: AHashMap::new(),
            generation: 0,
        }
    }
}

impl<T: Copy> StateCache<T> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the object built for `hash`.
    pub fn find(&self, hash: u64) -> Option<T> {
        self.entries.get(&hash).copied()
    }

    /// Inserts the object built for `hash`.
    ///
    /// ## Returns
    /// The object previously stored under `hash`. The caller owns it and must
    /// release it.
    pub fn add(&mut self, hash: u64, value: T) -> Option<T> {
        self.entries.insert(hash, value)
    }

    /// Removes and returns the object stored under `hash`.
    pub fn remove(&mut self, hash: u64) -> Option<T> {
        self.entries.remove(&hash)
    }

    /// Every cached object, in no particular order.
    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.entries.values().copied()
    }

    /// Drains every entry and starts a new generation.
    pub fn invalidate(&mut self) -> Vec<T> {
        self.generation = self.generation.wrapping_add(1);
        self.entries.drain().map(|(_, value)| value).collect()
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of invalidations so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy)]
struct LruEntry<T> {
    value: T,
    parent: u16,
    stamp: u64,
}

/// A capacity-bounded cache that evicts the least recently used entry.
///
/// Every entry remembers the texture it was derived from so all views of a
/// texture can be dropped when the texture is destroyed or resized.
#[derive(Debug)]
pub struct LruCache<T: Copy> {
    entries: AHashMap<u64, LruEntry<T>>,
    capacity: usize,
    clock: u64,
}

impl<T: Copy> LruCache<T> {
    /// Creates an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: AHashMap::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Looks up `hash` and marks it as most recently used.
    pub fn find(&mut self, hash: u64) -> Option<T> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(&hash).map(|entry| {
            entry.stamp = clock;
            entry.value
        })
    }

    /// Inserts an entry derived from `parent`.
    ///
    /// ## Returns
    /// The object displaced by the insert: either the previous value stored
    /// under `hash` or the evicted least recently used entry.
    pub fn add(&mut self, hash: u64, value: T, parent: u16) -> Option<T> {
        self.clock += 1;
        let entry = LruEntry {
            value,
            parent,
            stamp: self.clock,
        };
        if let Some(old) = self.entries.insert(hash, entry) {
            return Some(old.value);
        }
        if self.entries.len() <= self.capacity {
            return None;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.stamp)
            .map(|(key, _)| *key)?;
        log::trace!("Image view cache full ({}), evicting {oldest:#x}.", self.capacity);
        self.entries.remove(&oldest).map(|entry| entry.value)
    }

    /// Removes every entry derived from `parent`.
    pub fn invalidate_with_parent(&mut self, parent: u16) -> Vec<T> {
        let keys: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.parent == parent)
            .map(|(key, _)| *key)
            .collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .map(|entry| entry.value)
            .collect()
    }

    /// Removes every entry.
    pub fn invalidate(&mut self) -> Vec<T> {
        self.entries.drain().map(|(_, entry)| entry.value).collect()
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_cache_keeps_one_object_per_hash() {
        let mut cache = StateCache::new();
        assert_eq!(cache.find(7), None);
        assert_eq!(cache.add(7, 100u64), None);
        assert_eq!(cache.find(7), Some(100));
        assert_eq!(cache.add(7, 101), Some(100), "replaced object is handed back");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_drains_and_bumps_generation() {
        let mut cache = StateCache::new();
        cache.add(1, 10u64);
        cache.add(2, 20);
        let mut drained = cache.invalidate();
        drained.sort_unstable();
        assert_eq!(drained, vec![10, 20]);
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut cache = LruCache::new(2);
        assert_eq!(cache.add(1, 'a', 0), None);
        assert_eq!(cache.add(2, 'b', 0), None);
        // Touch 1 so 2 becomes the oldest.
        assert_eq!(cache.find(1), Some('a'));
        assert_eq!(cache.add(3, 'c', 0), Some('b'));
        assert_eq!(cache.find(2), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn lru_invalidates_by_parent() {
        let mut cache = LruCache::new(8);
        cache.add(1, 'a', 4);
        cache.add(2, 'b', 5);
        cache.add(3, 'c', 4);
        let mut dropped = cache.invalidate_with_parent(4);
        dropped.sort_unstable();
        assert_eq!(dropped, vec!['a', 'c']);
        assert_eq!(cache.find(2), Some('b'));
    }
}
