// Copyright (c) 2026 Prism Contributors
// SPDX-License-Identifier: AGPL-3.0

// Bounded Agent Memory - frequency-evicting key/value store
//
// Each agent owns one of these and uses it as its result cache. The store
// never holds more than `max_items` entries; inserting a new key into a full
// store evicts the least-frequently-used entry, oldest insertion first on
// ties.
//
// The eviction index is a min-heap of (access_count, insertion_seq, key)
// tuples. Entries are never updated in place: every access pushes a fresh
// tuple and the outdated one is skipped when it surfaces (lazy deletion).
// The heap is rebuilt from the live entries once stale tuples dominate.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Stale heap tuples tolerated per live entry before the index is rebuilt.
const COMPACTION_FACTOR: usize = 4;

/// A cached value and its usage bookkeeping.
#[derive(Debug, Clone)]
pub struct MemoryItem<V> {
    pub key: String,
    pub value: V,
    pub written_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Slot<V> {
    item: MemoryItem<V>,
    seq: u64,
}

#[derive(Debug)]
pub struct BoundedMemory<V> {
    max_items: usize,
    slots: HashMap<String, Slot<V>>,
    index: BinaryHeap<Reverse<(u64, u64, String)>>,
    next_seq: u64,
}

impl<V> BoundedMemory<V> {
    /// Creates a store holding at most `max_items` entries (at least one).
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items: max_items.max(1),
            slots: HashMap::new(),
            index: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_items
    }

    /// Inserts or overwrites `key`.
    ///
    /// Overwriting keeps the key's insertion position and counts as an access.
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Utc::now();

        if let Some(slot) = self.slots.get_mut(&key) {
            slot.item.value = value;
            slot.item.written_at = now;
            slot.item.access_count += 1;
            slot.item.last_accessed_at = Some(now);
            let entry = (slot.item.access_count, slot.seq, key);
            self.push_index(entry);
            return;
        }

        if self.slots.len() >= self.max_items {
            self.evict_one();
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(
            key.clone(),
            Slot {
                item: MemoryItem {
                    key: key.clone(),
                    value,
                    written_at: now,
                    access_count: 0,
                    last_accessed_at: None,
                },
                seq,
            },
        );
        self.push_index((0, seq, key));
    }

    /// Returns the value for `key`, counting the read as an access.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let slot = self.slots.get_mut(key)?;
        slot.item.access_count += 1;
        slot.item.last_accessed_at = Some(Utc::now());
        let entry = (slot.item.access_count, slot.seq, key.to_string());
        self.push_index(entry);
        self.slots.get(key).map(|slot| &slot.item.value)
    }

    /// Reads an entry without touching its access count.
    pub fn peek(&self, key: &str) -> Option<&MemoryItem<V>> {
        self.slots.get(key).map(|slot| &slot.item)
    }

    pub fn has(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        let mut keyed: Vec<(u64, &String)> =
            self.slots.iter().map(|(key, slot)| (slot.seq, key)).collect();
        keyed.sort_unstable_by_key(|(seq, _)| *seq);
        keyed.into_iter().map(|(_, key)| key.clone()).collect()
    }

    fn push_index(&mut self, entry: (u64, u64, String)) {
        self.index.push(Reverse(entry));
        if self.index.len() > COMPACTION_FACTOR * self.slots.len().max(1) + 16 {
            self.rebuild_index();
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .slots
            .iter()
            .map(|(key, slot)| Reverse((slot.item.access_count, slot.seq, key.clone())))
            .collect();
    }

    fn is_live(&self, access_count: u64, seq: u64, key: &str) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.seq == seq && slot.item.access_count == access_count)
            .unwrap_or(false)
    }

    fn evict_one(&mut self) {
        while let Some(Reverse((access_count, seq, key))) = self.index.pop() {
            if self.is_live(access_count, seq, &key) {
                tracing::trace!(key = %key, access_count, "Evicting memory entry");
                self.slots.remove(&key);
                return;
            }
        }
        // Index exhausted without a live tuple: fall back to a full scan.
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| (slot.item.access_count, slot.seq))
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            self.slots.remove(&key);
        }
        self.rebuild_index();
    }
}
