//! Remote Transcript Sources
//!
//! Contracts and shared types for fetching transcripts from remote
//! services, plus the ordered-language lookup that drives them:
//! - The Vocaminary cloud transcript API
//! - A locally running yt-dlp extraction service
//! - The rate-limit gate and usage/health telemetry around them

mod ratelimit;
mod telemetry;
mod vocaminary;
mod ytdlp;

pub use ratelimit::RateLimitClient;
pub use telemetry::{Telemetry, TelemetryMetrics};
pub use vocaminary::VocaminaryClient;
pub use ytdlp::YtdlpClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::captions::{CaptionData, Segment};
use crate::core::{CoreError, CoreResult, TimeSec, UsageSnapshot};

// =============================================================================
// Transcript Payload
// =============================================================================

/// A timed text run without word-level structure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedText {
    pub start: TimeSec,
    pub end: TimeSec,
    pub text: String,
}

/// What a transcript source actually delivered, tagged by shape.
///
/// Sources differ in how refined their output is: the cloud API returns
/// fully tokenized segments, the local extractor returns either timed text
/// or a raw VTT document. Downstream code matches on the shape instead of
/// probing optional fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum TranscriptPayload {
    /// Display-ready segments with word structure
    Segments(Vec<Segment>),
    /// Timed text runs that still need tokenization and segmentation
    TextCaptions(Vec<TimedText>),
    /// A raw WebVTT document that still needs parsing
    VttContent(String),
}

impl TranscriptPayload {
    /// Number of units in the payload; zero for unparsed VTT.
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Segments(segments) => segments.len(),
            Self::TextCaptions(captions) => captions.len(),
            Self::VttContent(_) => 0,
        }
    }
}

/// A successful fetch from a transcript source.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscriptResult {
    pub payload: TranscriptPayload,
    pub caption_data: CaptionData,
    /// True when the source served its own cached copy
    pub from_cache: bool,
}

// =============================================================================
// Source Contract
// =============================================================================

/// A remote service that can deliver a transcript for a video.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Source identifier as recorded in caption provenance
    fn name(&self) -> &'static str;

    /// Fetches the transcript for one video in one language
    async fn fetch_transcript(
        &self,
        video_id: &str,
        language: &str,
    ) -> CoreResult<TranscriptResult>;
}

// =============================================================================
// Rate-Limit Gate
// =============================================================================

/// Outcome of a rate-limit check.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Seconds until the caller may retry, when denied
    pub wait_time_secs: u64,
    /// Human-readable denial reason
    pub reason: String,
    pub usage: Option<UsageSnapshot>,
}

impl RateLimitDecision {
    /// An unconditional allow, used when no gate applies.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }
}

/// Pre-fetch admission check against the usage service.
///
/// Implementations fail open: if the service is unreachable the check
/// allows the fetch, since blocking captions on a quota endpoint outage
/// is worse than briefly overshooting a quota.
#[async_trait]
pub trait RateLimitGate: Send + Sync {
    async fn check(&self, video_id: &str, language: &str) -> RateLimitDecision;
}

// =============================================================================
// Ordered-Language Lookup
// =============================================================================

/// One failed language attempt, kept for diagnostics.
#[derive(Clone, Debug)]
pub struct LanguageAttempt {
    pub language: String,
    pub error: CoreError,
}

/// Tries each language in priority order against `source`, returning the
/// first success along with the attempts that failed before it.
///
/// When every language fails, the last error is returned and the full
/// attempt list is logged so a missing track is distinguishable from a
/// service outage.
pub async fn fetch_first_language(
    source: &dyn TranscriptSource,
    video_id: &str,
    languages: &[String],
) -> Result<(TranscriptResult, Vec<LanguageAttempt>), (CoreError, Vec<LanguageAttempt>)> {
    let mut attempts = Vec::new();

    for language in languages {
        debug!(video_id, language, source = source.name(), "trying language");
        match source.fetch_transcript(video_id, language).await {
            Ok(result) => return Ok((result, attempts)),
            Err(error) => attempts.push(LanguageAttempt {
                language: language.clone(),
                error,
            }),
        }
    }

    let last_error = attempts
        .last()
        .map(|a| a.error.clone())
        .unwrap_or_else(|| CoreError::Internal("no languages configured".to_string()));

    Err((last_error, attempts))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::captions::CaptionKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        succeed_on: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_transcript(
            &self,
            _video_id: &str,
            language: &str,
        ) -> CoreResult<TranscriptResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed_on == Some(language) {
                Ok(TranscriptResult {
                    payload: TranscriptPayload::TextCaptions(vec![]),
                    caption_data: CaptionData {
                        language: language.to_string(),
                        kind: CaptionKind::Manual,
                        source: "scripted".to_string(),
                        count: 0,
                    },
                    from_cache: false,
                })
            } else {
                Err(CoreError::Upstream {
                    kind: crate::core::UpstreamErrorKind::NoTranscript,
                    message: format!("no {language} transcript"),
                    warp_active: None,
                })
            }
        }
    }

    fn langs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_first_language_success_skips_rest() {
        let source = ScriptedSource {
            succeed_on: Some("en"),
            calls: AtomicUsize::new(0),
        };

        let (result, attempts) = fetch_first_language(&source, "vid", &langs(&["en", "de"]))
            .await
            .unwrap();

        assert_eq!(result.caption_data.language, "en");
        assert!(attempts.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_falls_through_to_later_language() {
        let source = ScriptedSource {
            succeed_on: Some("de"),
            calls: AtomicUsize::new(0),
        };

        let (result, attempts) = fetch_first_language(&source, "vid", &langs(&["en", "de"]))
            .await
            .unwrap();

        assert_eq!(result.caption_data.language, "de");
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].language, "en");
    }

    #[tokio::test]
    async fn test_all_languages_fail_returns_last_error() {
        let source = ScriptedSource {
            succeed_on: None,
            calls: AtomicUsize::new(0),
        };

        let (error, attempts) = fetch_first_language(&source, "vid", &langs(&["en", "de"]))
            .await
            .unwrap_err();

        assert_eq!(attempts.len(), 2);
        assert!(matches!(error, CoreError::Upstream { .. }));
        assert!(error.to_string().contains("de"));
    }

    #[test]
    fn test_payload_tagged_serialization() {
        let payload = TranscriptPayload::VttContent("WEBVTT".to_string());
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"kind":"vttContent","payload":"WEBVTT"}"#);

        let parsed: TranscriptPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_payload_unit_count() {
        assert_eq!(TranscriptPayload::VttContent(String::new()).unit_count(), 0);
        assert_eq!(
            TranscriptPayload::TextCaptions(vec![TimedText {
                start: 0.0,
                end: 1.0,
                text: "hi".to_string(),
            }])
            .unit_count(),
            1
        );
    }
}
