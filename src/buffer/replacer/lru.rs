//! LRU (Least Recently Used) replacement policy.

use std::collections::HashMap;

use crate::common::SlotId;

#[derive(Debug, Clone, Copy)]
struct LruEntry {
    /// Logical time of the most recent access.
    last_access: u64,
    evictable: bool,
}

/// Pin-aware LRU eviction policy.
///
/// Every access stamps the slot with the next value of a monotonic counter,
/// so no two slots ever share a timestamp and the victim is always unique.
/// Pinned slots are skipped when choosing a victim.
///
/// Choosing a victim does not remove it: the pool only calls
/// [`remove`](Self::remove) once the victim was actually flushed and released.
#[derive(Debug, Default)]
pub struct LruReplacer {
    clock: u64,
    entries: HashMap<SlotId, LruEntry>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a slot was accessed now.
    ///
    /// New slots start out evictable.
    pub fn record_access(&mut self, slot: SlotId) {
        self.clock += 1;
        let clock = self.clock;
        self.entries
            .entry(slot)
            .and_modify(|e| e.last_access = clock)
            .or_insert(LruEntry {
                last_access: clock,
                evictable: true,
            });
    }

    /// Mark a slot as evictable (pin count 0) or not.
    pub fn set_evictable(&mut self, slot: SlotId, evictable: bool) {
        if let Some(entry) = self.entries.get_mut(&slot) {
            entry.evictable = evictable;
        }
    }

    /// The least recently accessed evictable slot, or None if all are pinned.
    pub fn victim(&self) -> Option<SlotId> {
        self.entries
            .iter()
            .filter(|(_, e)| e.evictable)
            .min_by_key(|(_, e)| e.last_access)
            .map(|(&slot, _)| slot)
    }

    /// Forget a slot entirely.
    pub fn remove(&mut self, slot: SlotId) {
        self.entries.remove(&slot);
    }

    /// Tracked slots, least recently accessed first.
    pub fn lru_order(&self) -> Vec<SlotId> {
        let mut slots: Vec<_> = self.entries.iter().map(|(&s, e)| (e.last_access, s)).collect();
        slots.sort_unstable();
        slots.into_iter().map(|(_, s)| s).collect()
    }

    /// Number of evictable slots.
    pub fn size(&self) -> usize {
        self.entries.values().filter(|e| e.evictable).count()
    }
}
