//! Vocaminary Cloud Transcript Client
//!
//! Fetches transcripts from the Vocaminary transcript API. The API returns
//! fully timed snippets; auto-generated tracks carry padded durations which
//! are scaled down here so segments do not linger past the spoken words.
//!
//! API failures come back as structured `error_type` values; an IP-block
//! report is escalated in the logs together with the server's Warp proxy
//! status, since it means the remote fetcher needs operator attention.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::{Telemetry, TranscriptPayload, TranscriptResult, TranscriptSource};
use crate::core::captions::{tokenize, CaptionData, CaptionKind, Segment};
use crate::core::{CoreError, CoreResult, UpstreamErrorKind};

/// Auto-generated caption durations are padded upstream; scale them down
/// so each segment ends near the end of its spoken words.
const AUTO_CAPTION_DURATION_SCALE: f64 = 0.45;

/// Client for the cloud transcript API.
pub struct VocaminaryClient {
    base: String,
    client: reqwest::Client,
    telemetry: Option<Arc<Telemetry>>,
}

impl VocaminaryClient {
    pub fn new(
        base: impl Into<String>,
        client: reqwest::Client,
        telemetry: Option<Arc<Telemetry>>,
    ) -> Self {
        Self {
            base: base.into(),
            client,
            telemetry,
        }
    }

    fn log_health(
        &self,
        video_id: &str,
        status_code: u16,
        started: Instant,
        success: bool,
        error_message: Option<String>,
    ) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.log_api_health(
                video_id,
                status_code,
                started.elapsed().as_millis() as u64,
                success,
                error_message,
            );
        }
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    transcript: Option<TranscriptBody>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    from_cache: bool,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warp_active: Option<bool>,
}

/// The transcript field arrives either as an object wrapping the snippet
/// list or as a bare snippet array, depending on the API path taken.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptBody {
    Structured {
        snippets: Vec<Snippet>,
        #[serde(default)]
        is_generated: bool,
    },
    Bare(Vec<Snippet>),
}

impl TranscriptBody {
    fn into_parts(self) -> (Vec<Snippet>, bool) {
        match self {
            Self::Structured {
                snippets,
                is_generated,
            } => (snippets, is_generated),
            Self::Bare(snippets) => (snippets, false),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Snippet {
    start: f64,
    duration: f64,
    text: String,
}

// =============================================================================
// Source Implementation
// =============================================================================

#[async_trait]
impl TranscriptSource for VocaminaryClient {
    fn name(&self) -> &'static str {
        "vocaminary"
    }

    async fn fetch_transcript(
        &self,
        video_id: &str,
        language: &str,
    ) -> CoreResult<TranscriptResult> {
        let url = format!("{}/transcript/{}", self.base, video_id);
        let started = Instant::now();
        debug!(video_id, language, "vocaminary: requesting transcript");

        let response = self
            .client
            .get(&url)
            .query(&[("lang", language)])
            .send()
            .await
            .map_err(|err| {
                self.log_health(video_id, 0, started, false, Some(err.to_string()));
                CoreError::from_transport(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(video_id, %status, "vocaminary: HTTP failure");
            self.log_health(
                video_id,
                status.as_u16(),
                started,
                false,
                Some(format!("HTTP {status}")),
            );
            return Err(CoreError::FetchFailed(format!(
                "transcript API returned HTTP {status}"
            )));
        }

        let body: TranscriptResponse = response.json().await.map_err(|err| {
            self.log_health(video_id, status.as_u16(), started, false, Some(err.to_string()));
            CoreError::from_transport(err)
        })?;

        let (snippets, is_generated) = match body.transcript {
            Some(transcript) => transcript.into_parts(),
            None => (Vec::new(), false),
        };

        if !body.success || snippets.is_empty() {
            let kind = UpstreamErrorKind::from_wire(body.error_type.as_deref().unwrap_or(""));
            let message = body.error.unwrap_or_else(|| "Unknown error".to_string());

            if kind == UpstreamErrorKind::YoutubeIpBlocked {
                error!(
                    video_id,
                    warp_active = ?body.warp_active,
                    "vocaminary: YouTube is blocking the fetcher's IP"
                );
            } else if kind.is_user_side() {
                info!(video_id, %kind, %message, "vocaminary: video has no usable transcript");
            } else {
                error!(video_id, %kind, %message, "vocaminary: server-side failure");
            }

            self.log_health(video_id, status.as_u16(), started, false, Some(message.clone()));
            return Err(CoreError::Upstream {
                kind,
                message,
                warp_active: body.warp_active,
            });
        }

        self.log_health(video_id, status.as_u16(), started, true, None);

        let scale = if is_generated {
            AUTO_CAPTION_DURATION_SCALE
        } else {
            1.0
        };
        let segments: Vec<Segment> = snippets
            .into_iter()
            .map(|snippet| Segment {
                start: snippet.start,
                end: snippet.start + snippet.duration * scale,
                words: tokenize(&snippet.text),
                text: snippet.text,
            })
            .collect();

        info!(
            video_id,
            segments = segments.len(),
            auto_generated = is_generated,
            from_cache = body.from_cache,
            "vocaminary: transcript fetched"
        );

        let count = segments.len();
        Ok(TranscriptResult {
            payload: TranscriptPayload::Segments(segments),
            caption_data: CaptionData {
                language: body.language.unwrap_or_else(|| language.to_string()),
                kind: if is_generated {
                    CaptionKind::AutoGenerated
                } else {
                    CaptionKind::Manual
                },
                source: self.name().to_string(),
                count,
            },
            from_cache: body.from_cache,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
