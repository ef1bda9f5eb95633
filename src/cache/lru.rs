//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Keys live in a VecDeque where:
/// - Front = Least recently used
/// - Back = Most recently used
///
/// Touching a key appends a new stamped slot instead of searching the queue;
/// the superseded slot becomes a ghost that is skipped on eviction and
/// dropped by periodic compaction. Touch, remove and evict are O(1) amortized.
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Access slots, oldest first. Slots whose stamp is stale are ghosts.
    order: VecDeque<(K, u64)>,
    /// Current stamp of every live key
    stamps: HashMap<K, u64>,
    next_stamp: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self {
            order: VecDeque::new(),
            stamps: HashMap::new(),
            next_stamp: 0,
        }
    }
}

impl<K: Hash + Eq + Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Touch ==
    /// Marks a key as most recently used, tracking it if new.
    pub fn touch(&mut self, key: &K) {
        self.next_stamp += 1;
        self.stamps.insert(key.clone(), self.next_stamp);
        self.order.push_back((key.clone(), self.next_stamp));
        self.maybe_compact();
    }

    // == Remove ==
    /// Stops tracking a key. Its queue slot is left behind as a ghost.
    pub fn remove(&mut self, key: &K) {
        self.stamps.remove(key);
        self.maybe_compact();
    }

    // == Evict Oldest ==
    /// Returns and stops tracking the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        while let Some((key, stamp)) = self.order.pop_front() {
            if self.is_live(&key, stamp) {
                self.stamps.remove(&key);
                return Some(key);
            }
        }
        None
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order
            .iter()
            .find(|(key, stamp)| self.is_live(key, *stamp))
            .map(|(key, _)| key)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.order.clear();
        self.stamps.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.stamps.contains_key(key)
    }

    fn is_live(&self, key: &K, stamp: u64) -> bool {
        self.stamps.get(key) == Some(&stamp)
    }

    // Ghosts may at most double the queue before being swept.
    fn maybe_compact(&mut self) {
        if self.order.len() > 2 * self.stamps.len() + 16 {
            let stamps = &self.stamps;
            self.order.retain(|(key, stamp)| stamps.get(key) == Some(stamp));
        }
    }

    #[cfg(test)]
    fn queue_len(&self) -> usize {
        self.order.len()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(keys: &[&'static str]) -> LruTracker<&'static str> {
        let mut lru = LruTracker::new();
        for key in keys {
            lru.touch(key);
        }
        lru
    }

    #[test]
    fn test_lru_new() {
        let lru: LruTracker<String> = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = tracker(&["key1", "key2", "key3"]);

        // Touch key1 again - should move to back
        lru.touch(&"key1");

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.peek_oldest(), Some(&"key2"));
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = tracker(&["key1", "key2", "key3"]);

        assert_eq!(lru.evict_oldest(), Some("key1"));
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evict_oldest(), Some("key2"));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_lru_evict_empty() {
        let mut lru: LruTracker<String> = LruTracker::new();
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove_skips_ghost_on_eviction() {
        let mut lru = tracker(&["key1", "key2", "key3"]);

        lru.remove(&"key1");

        assert_eq!(lru.len(), 2);
        assert!(!lru.contains(&"key1"));
        assert_eq!(lru.evict_oldest(), Some("key2"));
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = tracker(&["a", "b", "c"]);

        // Access order a, c, b leaves a as the oldest
        lru.touch(&"a");
        lru.touch(&"c");
        lru.touch(&"b");

        assert_eq!(lru.evict_oldest(), Some("a"));
        assert_eq!(lru.evict_oldest(), Some("c"));
        assert_eq!(lru.evict_oldest(), Some("b"));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_touch_same_key_multiple_times() {
        let mut lru = tracker(&["key1", "key1", "key1"]);

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.evict_oldest(), Some("key1"));
        assert!(lru.is_empty());
        assert_eq!(lru.evict_oldest(), None, "ghost slots must not resurrect");
    }

    #[test]
    fn test_lru_ghosts_are_compacted() {
        let mut lru = tracker(&["hot", "cold"]);

        for _ in 0..10_000 {
            lru.touch(&"hot");
        }

        assert_eq!(lru.len(), 2);
        assert!(lru.queue_len() <= 2 * lru.len() + 17);
        assert_eq!(lru.peek_oldest(), Some(&"cold"));
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = tracker(&["a", "b"]);
        lru.clear();
        assert!(lru.is_empty());
        assert_eq!(lru.evict_oldest(), None);
    }
}
