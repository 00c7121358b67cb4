//! Subtitle Cache Module
//!
//! Layered caching for fetched subtitles:
//! - A bounded in-process cache for the last few videos (instant hits)
//! - A persistent store keyed by video id with a retention window
//!
//! The resolver exclusively owns both layers; no other component mutates
//! cache entries.

mod disk;
mod memory;

pub use disk::DiskCacheStore;
pub use memory::MemoryCache;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::captions::CaptionData;
use crate::core::remote::TranscriptPayload;
use crate::core::{CoreResult, EpochMs, VideoId};

// =============================================================================
// Cache Entry
// =============================================================================

/// One cached subtitle record for a video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// YouTube video id this entry belongs to
    pub video_id: VideoId,
    /// The fetched payload, in whatever shape the source delivered it
    pub payload: TranscriptPayload,
    /// Provenance metadata
    pub caption_data: CaptionData,
    /// Write timestamp, epoch milliseconds
    pub cached_at: EpochMs,
}

impl CacheEntry {
    /// Age of this entry in milliseconds relative to `now`
    pub fn age_ms(&self, now: EpochMs) -> i64 {
        now - self.cached_at
    }
}

// =============================================================================
// Cache Store
// =============================================================================

/// Persistent cache store contract: one record per video id.
///
/// Implementations handle their own retention policy; an expired record is
/// reported as a miss (and removed) rather than returned stale.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Looks up a non-expired entry
    async fn get(&self, video_id: &str) -> CoreResult<Option<CacheEntry>>;

    /// Writes or replaces the entry for its video id
    async fn set(&self, entry: CacheEntry) -> CoreResult<()>;

    /// Removes the entry for a video id
    async fn delete(&self, video_id: &str) -> CoreResult<()>;

    /// Removes all entries
    async fn clear(&self) -> CoreResult<()>;
}

// =============================================================================
// Statistics
// =============================================================================

/// Hit/miss counters across the resolution tiers.
#[derive(Debug, Default)]
pub struct CacheStats {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    server_hits: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time view of [`CacheStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub server_hits: u64,
    pub misses: u64,
    pub total: u64,
    /// Fraction of requests served by any cache tier, 0.0..=1.0
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_hit(&self) {
        self.server_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        let memory_hits = self.memory_hits.load(Ordering::Relaxed);
        let disk_hits = self.disk_hits.load(Ordering::Relaxed);
        let server_hits = self.server_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = memory_hits + disk_hits + server_hits + misses;
        let hit_rate = if total > 0 {
            (memory_hits + disk_hits + server_hits) as f64 / total as f64
        } else {
            0.0
        };

        CacheStatsSnapshot {
            memory_hits,
            disk_hits,
            server_hits,
            misses,
            total,
            hit_rate,
        }
    }
}
