//! Subtitle Resolver
//!
//! Resolves subtitles for a video through the cache tiers, in order:
//! memory, persistent store, then a rate-limit-gated remote fetch. Cached
//! loads never touch the rate-limit service and are never reported as
//! usage.
//!
//! Concurrent requests for the same video are collapsed: the first caller
//! performs the resolution while later callers subscribe to its outcome,
//! so one video never costs more than one upstream fetch at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as SyncMutex;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::auth::AuthTokenProvider;
use super::cache::{CacheEntry, CacheStats, CacheStatsSnapshot, CacheStore, DiskCacheStore, MemoryCache};
use super::captions::CaptionData;
use super::remote::{
    fetch_first_language, RateLimitClient, RateLimitGate, Telemetry, TranscriptPayload,
    TranscriptSource, VocaminaryClient, YtdlpClient,
};
use super::settings::{SourcePreference, SubtitleSettings};
use super::{now_ms, CoreError, CoreResult, UsageSnapshot};

// =============================================================================
// Resolution Outcome
// =============================================================================

/// Where a resolved subtitle set came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SubtitleSource {
    /// In-process cache
    #[serde(rename = "memory")]
    Memory,
    /// Persistent on-disk cache
    #[serde(rename = "local_cache")]
    LocalCache,
    /// Fresh fetch through the cloud transcript API
    #[serde(rename = "vocaminary")]
    Vocaminary,
    /// The cloud API served its own cached copy
    #[serde(rename = "vocaminary_api_cache")]
    VocaminaryApiCache,
    /// Fresh extraction by the local yt-dlp service
    #[serde(rename = "local-ytdlp")]
    LocalYtdlp,
}

impl SubtitleSource {
    fn from_wire(source: &str) -> Self {
        match source {
            "local-ytdlp" => Self::LocalYtdlp,
            _ => Self::Vocaminary,
        }
    }
}

/// A fully resolved subtitle set with provenance.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSubtitles {
    pub payload: TranscriptPayload,
    pub caption_data: CaptionData,
    pub source: SubtitleSource,
    /// True when served from any cache tier
    pub cached: bool,
    /// Entry age for cache hits
    pub age_ms: Option<i64>,
    /// Usage snapshot from the rate-limit check, for fresh fetches
    pub usage: Option<UsageSnapshot>,
}

type SharedOutcome = Result<ResolvedSubtitles, CoreError>;

type InFlightMap = SyncMutex<HashMap<String, broadcast::Sender<SharedOutcome>>>;

fn lock_in_flight(map: &InFlightMap) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<SharedOutcome>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes the in-flight entry for a video id when dropped, so an owning
/// caller that is cancelled mid-resolution still releases the slot instead
/// of leaving later callers subscribed to a sender nobody will fire.
struct InFlightGuard<'a> {
    map: &'a InFlightMap,
    video_id: &'a str,
}

impl InFlightGuard<'_> {
    /// Normal-completion path: removes the entry and hands back its sender
    /// so the outcome can be broadcast to any subscribers.
    fn finish(self) -> Option<broadcast::Sender<SharedOutcome>> {
        let tx = lock_in_flight(self.map).remove(self.video_id);
        std::mem::forget(self);
        tx
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock_in_flight(self.map).remove(self.video_id);
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Multi-tier subtitle resolver.
pub struct SubtitleResolver {
    memory: Mutex<MemoryCache>,
    store: Arc<dyn CacheStore>,
    gate: Arc<dyn RateLimitGate>,
    source: Arc<dyn TranscriptSource>,
    telemetry: Option<Arc<Telemetry>>,
    languages: Vec<String>,
    stats: CacheStats,
    in_flight: InFlightMap,
}

impl SubtitleResolver {
    pub fn new(
        memory_capacity: usize,
        store: Arc<dyn CacheStore>,
        gate: Arc<dyn RateLimitGate>,
        source: Arc<dyn TranscriptSource>,
        telemetry: Option<Arc<Telemetry>>,
        languages: Vec<String>,
    ) -> Self {
        Self {
            memory: Mutex::new(MemoryCache::new(memory_capacity)),
            store,
            gate,
            source,
            telemetry,
            languages,
            stats: CacheStats::default(),
            in_flight: SyncMutex::new(HashMap::new()),
        }
    }

    /// Builds a resolver wired to the configured services.
    pub fn from_settings(settings: &SubtitleSettings) -> CoreResult<Self> {
        let mut settings = settings.clone();
        settings.normalize();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|err| CoreError::Internal(format!("http client: {err}")))?;

        let auth = Arc::new(AuthTokenProvider::new(
            settings.auth_token.clone(),
            &settings.cache_dir,
        ));
        let telemetry = Arc::new(Telemetry::new(
            settings.api_base.clone(),
            client.clone(),
            Arc::clone(&auth),
        ));
        let gate = Arc::new(RateLimitClient::new(
            settings.api_base.clone(),
            Arc::clone(&auth),
            client.clone(),
        ));

        let source: Arc<dyn TranscriptSource> = match settings.preferred_source {
            SourcePreference::Cloud => Arc::new(VocaminaryClient::new(
                settings.transcript_api.clone(),
                client.clone(),
                Some(Arc::clone(&telemetry)),
            )),
            SourcePreference::LocalYtdlp => {
                Arc::new(YtdlpClient::new(settings.ytdlp_server.clone(), client))
            }
        };

        let store = Arc::new(DiskCacheStore::new(
            settings.cache_dir.join("subtitles"),
            Duration::from_secs(u64::from(settings.cache_retention_days) * 24 * 3600),
        ));

        Ok(Self::new(
            settings.memory_cache_size,
            store,
            gate,
            source,
            Some(telemetry),
            settings.languages.clone(),
        ))
    }

    /// Resolves subtitles for a video, collapsing concurrent requests for
    /// the same id into a single resolution.
    pub async fn resolve(&self, video_id: &str) -> SharedOutcome {
        self.resolve_with_title(video_id, None).await
    }

    /// Like [`resolve`](Self::resolve), with a video title attached to the
    /// usage log when a fresh fetch happens.
    pub async fn resolve_with_title(
        &self,
        video_id: &str,
        video_title: Option<&str>,
    ) -> SharedOutcome {
        if video_id.trim().is_empty() {
            return Err(CoreError::MissingVideoId);
        }

        // Either attach to an in-flight resolution or own a new one. An
        // attached caller whose owner goes away (cancelled mid-resolution)
        // loops back and takes ownership itself.
        loop {
            let rx = {
                let mut in_flight = lock_in_flight(&self.in_flight);
                match in_flight.get(video_id) {
                    Some(tx) => {
                        debug!(video_id, "joining in-flight resolution");
                        Some(tx.subscribe())
                    }
                    None => {
                        let (tx, _) = broadcast::channel(4);
                        in_flight.insert(video_id.to_string(), tx);
                        None
                    }
                }
            };

            let Some(mut rx) = rx else { break };
            match rx.recv().await {
                Ok(outcome) => return outcome,
                // Owner dropped without broadcasting; retry as owner
                Err(_) => continue,
            }
        }

        let guard = InFlightGuard {
            map: &self.in_flight,
            video_id,
        };
        let outcome = self.resolve_uncontended(video_id, video_title).await;

        // Remove the entry before broadcasting so a racing caller either
        // receives this outcome or starts a fresh resolution, never both.
        if let Some(tx) = guard.finish() {
            let _ = tx.send(outcome.clone());
        }

        outcome
    }

    async fn resolve_uncontended(
        &self,
        video_id: &str,
        video_title: Option<&str>,
    ) -> SharedOutcome {
        let now = now_ms();

        // Tier 1: memory
        if let Some(entry) = self.memory.lock().await.get(video_id) {
            self.stats.record_memory_hit();
            let age_ms = entry.age_ms(now);
            info!(video_id, age_ms, "memory cache hit");
            return Ok(ResolvedSubtitles {
                payload: entry.payload.clone(),
                caption_data: entry.caption_data.clone(),
                source: SubtitleSource::Memory,
                cached: true,
                age_ms: Some(age_ms),
                usage: None,
            });
        }

        // Tier 2: persistent store; never costs rate-limit quota
        match self.store.get(video_id).await {
            Ok(Some(entry)) => {
                self.stats.record_disk_hit();
                let age_ms = entry.age_ms(now);
                info!(video_id, age_ms, "persistent cache hit");
                self.memory.lock().await.insert(entry.clone());
                return Ok(ResolvedSubtitles {
                    payload: entry.payload,
                    caption_data: entry.caption_data,
                    source: SubtitleSource::LocalCache,
                    cached: true,
                    age_ms: Some(age_ms),
                    usage: None,
                });
            }
            Ok(None) => {}
            Err(err) => {
                // A broken store downgrades to a miss
                warn!(video_id, %err, "persistent cache lookup failed");
            }
        }

        // Tier 3: rate-limit gate, then remote fetch
        let primary_language = self
            .languages
            .first()
            .map(String::as_str)
            .unwrap_or("en");
        let decision = self.gate.check(video_id, primary_language).await;
        if !decision.allowed {
            warn!(
                video_id,
                wait_time_secs = decision.wait_time_secs,
                reason = %decision.reason,
                "fetch denied by rate limit"
            );
            return Err(CoreError::RateLimited {
                wait_time_secs: decision.wait_time_secs,
                reason: decision.reason,
                usage: decision.usage,
            });
        }

        self.stats.record_miss();
        let fetched = match fetch_first_language(self.source.as_ref(), video_id, &self.languages)
            .await
        {
            Ok((result, attempts)) => {
                for attempt in &attempts {
                    debug!(
                        video_id,
                        language = %attempt.language,
                        error = %attempt.error,
                        "language attempt failed before success"
                    );
                }
                result
            }
            Err((error, attempts)) => {
                warn!(
                    video_id,
                    attempts = attempts.len(),
                    %error,
                    "all language attempts failed"
                );
                if let Some(telemetry) = &self.telemetry {
                    telemetry.log_fetch(video_id, video_title, false, self.source.name(), false);
                }
                return Err(error);
            }
        };

        if fetched.from_cache {
            self.stats.record_server_hit();
            info!(video_id, "remote service cache hit");
        } else {
            info!(video_id, source = self.source.name(), "fresh fetch succeeded");
        }

        let entry = CacheEntry {
            video_id: video_id.to_string(),
            payload: fetched.payload.clone(),
            caption_data: fetched.caption_data.clone(),
            cached_at: now_ms(),
        };
        self.memory.lock().await.insert(entry.clone());
        if let Err(err) = self.store.set(entry).await {
            warn!(video_id, %err, "persistent cache write failed");
        }

        if let Some(telemetry) = &self.telemetry {
            telemetry.log_fetch(
                video_id,
                video_title,
                true,
                &fetched.caption_data.source,
                fetched.from_cache,
            );
        }

        let source = if fetched.from_cache {
            SubtitleSource::VocaminaryApiCache
        } else {
            SubtitleSource::from_wire(&fetched.caption_data.source)
        };

        Ok(ResolvedSubtitles {
            payload: fetched.payload,
            caption_data: fetched.caption_data,
            source,
            cached: fetched.from_cache,
            age_ms: None,
            usage: decision.usage,
        })
    }

    /// Clears the in-process cache only.
    pub async fn clear_memory_cache(&self) {
        self.memory.lock().await.clear();
    }

    /// Clears both cache tiers.
    pub async fn clear_all_caches(&self) -> CoreResult<()> {
        self.memory.lock().await.clear();
        self.store.clear().await
    }

    /// Hit/miss counters across the tiers.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
