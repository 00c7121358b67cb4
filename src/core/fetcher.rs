//! Caption Fetch Orchestrator
//!
//! Front door of the caption pipeline: resolves subtitles for a video,
//! normalizes whatever payload shape arrived into raw captions, runs
//! segmentation when the track needs it, and keeps the result as the
//! active caption set for playback lookups.
//!
//! User-facing conditions (cache provenance, quota usage, failures) are
//! reported through a [`NotificationSink`] so the presentation layer
//! decides how to surface them.

use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use super::captions::{
    parse_vtt, segment_captions, segmentation_stats, CaptionData, CaptionKind, RawCaption,
    Segment, SegmentLimits,
};
use super::remote::TranscriptPayload;
use super::resolver::{ResolvedSubtitles, SubtitleResolver, SubtitleSource};
use super::{CoreError, CoreResult, TimeSec, UsageSnapshot};

// =============================================================================
// Notifications
// =============================================================================

/// User-facing failure classification.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorNotice {
    /// Daily quota exhausted; retrying today will not help
    DailyLimit,
    /// Temporarily rate limited
    RateLimited { wait_minutes: u64 },
    /// Could not reach the service
    Network,
    /// The service took too long
    Timeout,
    /// The video itself has no usable transcript
    UserIssue {
        kind: super::UpstreamErrorKind,
        message: String,
    },
    /// The transcript service is unhealthy
    ServerIssue {
        kind: super::UpstreamErrorKind,
        message: String,
    },
    /// Anything else
    Generic { message: String },
}

/// Where the active captions came from, for the status line.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheNotice {
    Memory { age_minutes: i64 },
    Local { age_minutes: i64 },
    ServerCache,
    Fresh { source: SubtitleSource },
}

/// Receives user-facing events from the fetch pipeline.
pub trait NotificationSink: Send + Sync {
    fn error(&self, notice: ErrorNotice);
    fn cache_status(&self, notice: CacheNotice);
    fn usage(&self, usage: &UsageSnapshot);
}

/// Default sink that folds notifications into the log stream.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn error(&self, notice: ErrorNotice) {
        warn!(?notice, "caption fetch failed");
    }

    fn cache_status(&self, notice: CacheNotice) {
        info!(?notice, "caption provenance");
    }

    fn usage(&self, usage: &UsageSnapshot) {
        info!(?usage, "quota usage");
    }
}

// =============================================================================
// Fetcher
// =============================================================================

/// Summary of a completed fetch, for callers that show a status line.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchSummary {
    /// Number of display segments prepared
    pub count: usize,
    pub language: String,
    pub source: SubtitleSource,
    pub from_cache: bool,
}

/// The caption set currently prepared for playback.
#[derive(Clone, Debug)]
struct ActiveCaptions {
    video_id: String,
    segments: Vec<Segment>,
    caption_data: CaptionData,
}

/// Orchestrates resolution, segmentation, and the active caption set.
pub struct CaptionFetcher {
    resolver: Arc<SubtitleResolver>,
    sink: Arc<dyn NotificationSink>,
    limits: SegmentLimits,
    active: RwLock<Option<ActiveCaptions>>,
}

impl CaptionFetcher {
    pub fn new(resolver: Arc<SubtitleResolver>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            resolver,
            sink,
            limits: SegmentLimits::default(),
            active: RwLock::new(None),
        }
    }

    pub fn with_limits(mut self, limits: SegmentLimits) -> Self {
        self.limits = limits;
        self
    }

    // The active set stays usable even if a panic poisoned the lock;
    // caption state is replaced wholesale, never left half-written.
    fn active_read(&self) -> std::sync::RwLockReadGuard<'_, Option<ActiveCaptions>> {
        self.active.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn active_write(&self) -> std::sync::RwLockWriteGuard<'_, Option<ActiveCaptions>> {
        self.active.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetches subtitles for a video and prepares its display segments.
    /// The title, when known, rides along into the usage log.
    pub async fn fetch_and_prepare(
        &self,
        video_id: &str,
        video_title: Option<&str>,
    ) -> CoreResult<FetchSummary> {
        let resolved = match self.resolver.resolve_with_title(video_id, video_title).await {
            Ok(resolved) => resolved,
            Err(err) => {
                self.sink.error(classify_error(&err));
                return Err(err);
            }
        };

        if let Some(usage) = &resolved.usage {
            self.sink.usage(usage);
        }

        let segments = self.prepare_segments(&resolved);
        let stats = segmentation_stats(&segments, &self.limits);
        info!(
            video_id,
            segments = stats.total_segments,
            avg_words = stats.avg_words,
            "captions prepared"
        );

        self.sink.cache_status(cache_notice(&resolved));

        let summary = FetchSummary {
            count: segments.len(),
            language: resolved.caption_data.language.clone(),
            source: resolved.source,
            from_cache: resolved.cached,
        };

        let active = ActiveCaptions {
            video_id: video_id.to_string(),
            segments,
            caption_data: resolved.caption_data,
        };
        *self.active_write() = Some(active);

        Ok(summary)
    }

    fn prepare_segments(&self, resolved: &ResolvedSubtitles) -> Vec<Segment> {
        let raw: Vec<RawCaption> = match &resolved.payload {
            TranscriptPayload::Segments(segments) => segments
                .iter()
                .enumerate()
                .map(|(i, s)| RawCaption {
                    start: s.start,
                    end: s.end,
                    text: s.text.clone(),
                    words: s.words.clone(),
                    original_index: i,
                })
                .collect(),
            TranscriptPayload::TextCaptions(captions) => captions
                .iter()
                .enumerate()
                .map(|(i, c)| RawCaption::new(c.start, c.end, c.text.clone(), i))
                .collect(),
            TranscriptPayload::VttContent(content) => parse_vtt(content),
        };

        // Manual transcripts and cloud segments arrive display-ready;
        // everything else gets re-segmented to readable lengths.
        let already_segmented = resolved.caption_data.kind == CaptionKind::Manual
            || resolved.caption_data.source == "vocaminary";

        if already_segmented {
            raw.into_iter().map(Segment::from).collect()
        } else {
            segment_captions(&raw, &self.limits)
        }
    }

    /// The segment visible at `time_sec`, if captions are active.
    pub fn segment_at(&self, time_sec: TimeSec) -> Option<Segment> {
        let active = self.active_read();
        active.as_ref().and_then(|a| {
            a.segments
                .iter()
                .find(|s| s.is_visible_at(time_sec))
                .cloned()
        })
    }

    /// Metadata for the active caption set.
    pub fn active_caption_data(&self) -> Option<CaptionData> {
        self.active_read().as_ref().map(|a| a.caption_data.clone())
    }

    /// True when the active set belongs to `video_id`.
    pub fn is_active_for(&self, video_id: &str) -> bool {
        self.active_read().as_ref().is_some_and(|a| a.video_id == video_id)
    }

    /// Drops the active caption set.
    pub fn clear_active(&self) {
        *self.active_write() = None;
    }
}

fn classify_error(err: &CoreError) -> ErrorNotice {
    match err {
        CoreError::RateLimited {
            wait_time_secs,
            reason,
            ..
        } => {
            if reason.to_lowercase().contains("daily") {
                ErrorNotice::DailyLimit
            } else {
                ErrorNotice::RateLimited {
                    wait_minutes: wait_time_secs.div_ceil(60),
                }
            }
        }
        CoreError::Network(_) => ErrorNotice::Network,
        CoreError::Timeout(_) => ErrorNotice::Timeout,
        CoreError::Upstream { kind, message, .. } => {
            if kind.is_user_side() {
                ErrorNotice::UserIssue {
                    kind: *kind,
                    message: message.clone(),
                }
            } else {
                ErrorNotice::ServerIssue {
                    kind: *kind,
                    message: message.clone(),
                }
            }
        }
        other => ErrorNotice::Generic {
            message: other.to_string(),
        },
    }
}

fn cache_notice(resolved: &ResolvedSubtitles) -> CacheNotice {
    let age_minutes = resolved.age_ms.unwrap_or(0) / 60_000;
    match resolved.source {
        SubtitleSource::Memory => CacheNotice::Memory { age_minutes },
        SubtitleSource::LocalCache => CacheNotice::Local { age_minutes },
        SubtitleSource::VocaminaryApiCache => CacheNotice::ServerCache,
        source => CacheNotice::Fresh { source },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::{CacheEntry, CacheStore};
    use crate::core::remote::{
        RateLimitDecision, RateLimitGate, TimedText, TranscriptResult, TranscriptSource,
    };
    use crate::core::UpstreamErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // -------------------------------------------------------------------------
    // Test doubles
    // -------------------------------------------------------------------------

    struct NullStore;

    #[async_trait]
    impl CacheStore for NullStore {
        async fn get(&self, _video_id: &str) -> CoreResult<Option<CacheEntry>> {
            Ok(None)
        }
        async fn set(&self, _entry: CacheEntry) -> CoreResult<()> {
            Ok(())
        }
        async fn delete(&self, _video_id: &str) -> CoreResult<()> {
            Ok(())
        }
        async fn clear(&self) -> CoreResult<()> {
            Ok(())
        }
    }

    struct OpenGate;

    #[async_trait]
    impl RateLimitGate for OpenGate {
        async fn check(&self, _video_id: &str, _language: &str) -> RateLimitDecision {
            RateLimitDecision::allow()
        }
    }

    struct StaticSource {
        result: CoreResult<TranscriptResult>,
    }

    #[async_trait]
    impl TranscriptSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }
        async fn fetch_transcript(
            &self,
            _video_id: &str,
            _language: &str,
        ) -> CoreResult<TranscriptResult> {
            self.result.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        errors: Mutex<Vec<ErrorNotice>>,
        cache_notices: Mutex<Vec<CacheNotice>>,
        usage_reports: Mutex<Vec<UsageSnapshot>>,
    }

    impl NotificationSink for RecordingSink {
        fn error(&self, notice: ErrorNotice) {
            self.errors.lock().unwrap().push(notice);
        }
        fn cache_status(&self, notice: CacheNotice) {
            self.cache_notices.lock().unwrap().push(notice);
        }
        fn usage(&self, usage: &UsageSnapshot) {
            self.usage_reports.lock().unwrap().push(usage.clone());
        }
    }

    fn fetcher_for(result: CoreResult<TranscriptResult>) -> (CaptionFetcher, Arc<RecordingSink>) {
        let resolver = Arc::new(SubtitleResolver::new(
            3,
            Arc::new(NullStore),
            Arc::new(OpenGate),
            Arc::new(StaticSource { result }),
            None,
            vec!["en".to_string()],
        ));
        let sink = Arc::new(RecordingSink::default());
        let fetcher = CaptionFetcher::new(resolver, Arc::clone(&sink) as Arc<dyn NotificationSink>);
        (fetcher, sink)
    }

    fn text_captions_result(kind: CaptionKind, source: &str) -> TranscriptResult {
        TranscriptResult {
            payload: TranscriptPayload::TextCaptions(vec![
                TimedText {
                    start: 0.0,
                    end: 2.0,
                    text: "Hello world".to_string(),
                },
                TimedText {
                    start: 2.0,
                    end: 4.0,
                    text: "Goodbye now".to_string(),
                },
            ]),
            caption_data: CaptionData {
                language: "en".to_string(),
                kind,
                source: source.to_string(),
                count: 2,
            },
            from_cache: false,
        }
    }

    // -------------------------------------------------------------------------
    // Pipeline tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_vtt_payload_parsed_and_activated() {
        let result = TranscriptResult {
            payload: TranscriptPayload::VttContent(
                "00:00:01.000 --> 00:00:02.500\nHello world".to_string(),
            ),
            caption_data: CaptionData {
                language: "en".to_string(),
                kind: CaptionKind::Vtt,
                source: "local-ytdlp".to_string(),
                count: 0,
            },
            from_cache: false,
        };
        let (fetcher, sink) = fetcher_for(Ok(result));

        let summary = fetcher.fetch_and_prepare("vid0001", None).await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.language, "en");
        assert!(!summary.from_cache);

        assert!(fetcher.is_active_for("vid0001"));
        let segment = fetcher.segment_at(1.5).unwrap();
        assert_eq!(segment.text, "Hello world");
        assert!(fetcher.segment_at(10.0).is_none());

        let notices = sink.cache_notices.lock().unwrap();
        assert_eq!(
            notices[0],
            CacheNotice::Fresh {
                source: SubtitleSource::LocalYtdlp
            }
        );
    }

    #[tokio::test]
    async fn test_manual_track_skips_segmentation() {
        let (fetcher, _sink) = fetcher_for(Ok(text_captions_result(CaptionKind::Manual, "static")));

        let summary = fetcher.fetch_and_prepare("vid0001", None).await.unwrap();
        // Two timed texts stay two segments
        assert_eq!(summary.count, 2);
        assert_eq!(fetcher.segment_at(0.5).unwrap().text, "Hello world");
    }

    #[tokio::test]
    async fn test_title_rides_along_to_resolution() {
        let (fetcher, _sink) = fetcher_for(Ok(text_captions_result(CaptionKind::Manual, "static")));

        let summary = fetcher
            .fetch_and_prepare("vid0001", Some("Learning Rust"))
            .await
            .unwrap();
        assert_eq!(summary.count, 2);
        assert!(fetcher.is_active_for("vid0001"));
    }

    #[tokio::test]
    async fn test_auto_generated_track_is_segmented() {
        // One long auto-generated run must be split into bounded segments
        let long_text = "one two three four five six seven eight nine ten \
                         eleven twelve thirteen fourteen fifteen sixteen";
        let result = TranscriptResult {
            payload: TranscriptPayload::TextCaptions(vec![TimedText {
                start: 0.0,
                end: 8.0,
                text: long_text.to_string(),
            }]),
            caption_data: CaptionData {
                language: "en".to_string(),
                kind: CaptionKind::AutoGenerated,
                source: "static".to_string(),
                count: 1,
            },
            from_cache: false,
        };
        let (fetcher, _sink) = fetcher_for(Ok(result));

        let summary = fetcher.fetch_and_prepare("vid0001", None).await.unwrap();
        assert!(summary.count > 1);
    }

    #[tokio::test]
    async fn test_error_is_classified_and_reported() {
        let (fetcher, sink) = fetcher_for(Err(CoreError::Upstream {
            kind: UpstreamErrorKind::TranscriptsDisabled,
            message: "Subtitles are disabled".to_string(),
            warp_active: None,
        }));

        let err = fetcher.fetch_and_prepare("vid0001", None).await.unwrap_err();
        assert!(matches!(err, CoreError::Upstream { .. }));
        assert!(!fetcher.is_active_for("vid0001"));

        let errors = sink.errors.lock().unwrap();
        assert_eq!(
            errors[0],
            ErrorNotice::UserIssue {
                kind: UpstreamErrorKind::TranscriptsDisabled,
                message: "Subtitles are disabled".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_clear_active() {
        let (fetcher, _sink) = fetcher_for(Ok(text_captions_result(CaptionKind::Manual, "static")));
        fetcher.fetch_and_prepare("vid0001", None).await.unwrap();
        fetcher.clear_active();

        assert!(!fetcher.is_active_for("vid0001"));
        assert!(fetcher.segment_at(0.5).is_none());
        assert!(fetcher.active_caption_data().is_none());
    }

    // -------------------------------------------------------------------------
    // Classification tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_classify_daily_limit() {
        let err = CoreError::RateLimited {
            wait_time_secs: 43200,
            reason: "Daily limit reached".to_string(),
            usage: None,
        };
        assert_eq!(classify_error(&err), ErrorNotice::DailyLimit);
    }

    #[test]
    fn test_classify_rate_limited_rounds_wait_up() {
        let err = CoreError::RateLimited {
            wait_time_secs: 301,
            reason: "burst".to_string(),
            usage: None,
        };
        assert_eq!(
            classify_error(&err),
            ErrorNotice::RateLimited { wait_minutes: 6 }
        );
    }

    #[test]
    fn test_classify_transport_errors() {
        assert_eq!(
            classify_error(&CoreError::Network("refused".to_string())),
            ErrorNotice::Network
        );
        assert_eq!(
            classify_error(&CoreError::Timeout("30s".to_string())),
            ErrorNotice::Timeout
        );
        assert!(matches!(
            classify_error(&CoreError::MissingVideoId),
            ErrorNotice::Generic { .. }
        ));
    }

    #[test]
    fn test_cache_notice_mapping() {
        let resolved = ResolvedSubtitles {
            payload: TranscriptPayload::VttContent(String::new()),
            caption_data: CaptionData {
                language: "en".to_string(),
                kind: CaptionKind::Vtt,
                source: "local-ytdlp".to_string(),
                count: 0,
            },
            source: SubtitleSource::Memory,
            cached: true,
            age_ms: Some(120_000),
            usage: None,
        };
        assert_eq!(
            cache_notice(&resolved),
            CacheNotice::Memory { age_minutes: 2 }
        );
    }
}
