//! Bounded In-Process Cache
//!
//! Keeps the last N fetched videos for instant access. Eviction key is
//! insertion order: when the cache grows past capacity the oldest-inserted
//! video is dropped, regardless of how recently it was read.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use super::CacheEntry;
use crate::core::VideoId;

/// In-process subtitle cache bounded to a fixed number of videos.
#[derive(Debug)]
pub struct MemoryCache {
    capacity: usize,
    entries: HashMap<VideoId, CacheEntry>,
    insertion_order: VecDeque<VideoId>,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` videos (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    /// Looks up a cached entry; reads do not affect eviction order.
    pub fn get(&self, video_id: &str) -> Option<&CacheEntry> {
        self.entries.get(video_id)
    }

    /// Inserts or replaces an entry, evicting the oldest-inserted video
    /// when the cache exceeds capacity. Replacing an existing key keeps
    /// its original position in the eviction order.
    pub fn insert(&mut self, entry: CacheEntry) {
        if !self.entries.contains_key(&entry.video_id) {
            self.insertion_order.push_back(entry.video_id.clone());
        }
        self.entries.insert(entry.video_id.clone(), entry);

        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
                debug!(video_id = %oldest, "memory cache evicted");
            } else {
                break;
            }
        }
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }

    /// Number of cached videos.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample_entry;
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache = MemoryCache::new(3);
        cache.insert(sample_entry("video000001", 1));

        assert!(cache.get("video000001").is_some());
        assert!(cache.get("video000002").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_inserted_at_capacity() {
        let mut cache = MemoryCache::new(3);
        cache.insert(sample_entry("video000001", 1));
        cache.insert(sample_entry("video000002", 2));
        cache.insert(sample_entry("video000003", 3));

        // Reading the oldest entry must not protect it
        let _ = cache.get("video000001");

        cache.insert(sample_entry("video000004", 4));

        assert!(cache.get("video000001").is_none());
        assert!(cache.get("video000002").is_some());
        assert!(cache.get("video000003").is_some());
        assert!(cache.get("video000004").is_some());
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_reinsert_keeps_original_position() {
        let mut cache = MemoryCache::new(2);
        cache.insert(sample_entry("video000001", 1));
        cache.insert(sample_entry("video000002", 2));
        // Refreshing the first key does not move it to the back
        cache.insert(sample_entry("video000001", 3));
        cache.insert(sample_entry("video000003", 4));

        assert!(cache.get("video000001").is_none());
        assert!(cache.get("video000002").is_some());
        assert!(cache.get("video000003").is_some());
    }

    #[test]
    fn test_reinsert_updates_value() {
        let mut cache = MemoryCache::new(2);
        cache.insert(sample_entry("video000001", 1));
        cache.insert(sample_entry("video000001", 99));

        assert_eq!(cache.get("video000001").unwrap().cached_at, 99);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = MemoryCache::new(3);
        cache.insert(sample_entry("video000001", 1));
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get("video000001").is_none());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = MemoryCache::new(0);
        cache.insert(sample_entry("video000001", 1));
        assert_eq!(cache.len(), 1);
    }
}
