//! Local yt-dlp Extraction Client
//!
//! Talks to a locally running yt-dlp companion service. Preferred path is
//! the JSON3 endpoint, which returns timed caption groups; when that is not
//! available for a track the client falls back to raw VTT extraction and
//! leaves parsing to the caption pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{TimedText, TranscriptPayload, TranscriptResult, TranscriptSource};
use crate::core::captions::{CaptionData, CaptionKind, Segment, Word};
use crate::core::{CoreError, CoreResult};

/// Client for the local yt-dlp extraction service.
pub struct YtdlpClient {
    base: String,
    client: reqwest::Client,
}

impl YtdlpClient {
    pub fn new(base: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            client,
        }
    }

    async fn fetch_json3(&self, video_id: &str, language: &str) -> CoreResult<Option<TranscriptResult>> {
        let url = format!("{}/extract-subs-json3", self.base);
        let response = self
            .client
            .post(&url)
            .json(&ExtractRequest { video_id, language })
            .send()
            .await
            .map_err(CoreError::from_transport)?;

        if !response.status().is_success() {
            warn!(video_id, status = %response.status(), "yt-dlp: JSON3 endpoint failed");
            return Ok(None);
        }

        let body: Json3Response = response.json().await.map_err(CoreError::from_transport)?;
        if !body.success {
            return Ok(None);
        }

        let groups = body.caption_groups;
        info!(video_id, groups = groups.len(), "yt-dlp: JSON3 extraction succeeded");

        // Word-level timing is only usable when every group carries it
        let payload = if !groups.is_empty() && groups.iter().all(|g| g.words.is_some()) {
            TranscriptPayload::Segments(
                groups
                    .into_iter()
                    .map(|g| Segment {
                        start: g.start,
                        end: g.end,
                        words: g.words.unwrap_or_default(),
                        text: g.text,
                    })
                    .collect(),
            )
        } else {
            TranscriptPayload::TextCaptions(
                groups
                    .into_iter()
                    .map(|g| TimedText {
                        start: g.start,
                        end: g.end,
                        text: g.text,
                    })
                    .collect(),
            )
        };

        let count = payload.unit_count();
        Ok(Some(TranscriptResult {
            payload,
            caption_data: CaptionData {
                language: body.language.unwrap_or_else(|| language.to_string()),
                kind: CaptionKind::from_wire(body.subtitle_type.as_deref().unwrap_or("")),
                source: self.name().to_string(),
                count,
            },
            from_cache: false,
        }))
    }

    async fn fetch_vtt(&self, video_id: &str, language: &str) -> CoreResult<Option<TranscriptResult>> {
        let url = format!("{}/extract-subs", self.base);
        let response = self
            .client
            .post(&url)
            .json(&ExtractRequest { video_id, language })
            .send()
            .await
            .map_err(CoreError::from_transport)?;

        if !response.status().is_success() {
            warn!(video_id, status = %response.status(), "yt-dlp: VTT endpoint failed");
            return Ok(None);
        }

        let body: VttResponse = response.json().await.map_err(CoreError::from_transport)?;
        if !body.success || body.content.is_empty() {
            return Ok(None);
        }

        info!(video_id, "yt-dlp: VTT extraction succeeded");
        Ok(Some(TranscriptResult {
            payload: TranscriptPayload::VttContent(body.content),
            caption_data: CaptionData {
                language: body.language.unwrap_or_else(|| language.to_string()),
                kind: CaptionKind::Vtt,
                source: "local-ytdlp".to_string(),
                count: 0,
            },
            from_cache: false,
        }))
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    video_id: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct Json3Response {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    caption_groups: Vec<CaptionGroup>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    subtitle_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionGroup {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    words: Option<Vec<Word>>,
}

#[derive(Debug, Deserialize)]
struct VttResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    content: String,
    #[serde(default)]
    language: Option<String>,
}

// =============================================================================
// Source Implementation
// =============================================================================

#[async_trait]
impl TranscriptSource for YtdlpClient {
    fn name(&self) -> &'static str {
        "local-ytdlp"
    }

    async fn fetch_transcript(
        &self,
        video_id: &str,
        language: &str,
    ) -> CoreResult<TranscriptResult> {
        debug!(video_id, language, "yt-dlp: requesting extraction");

        if let Some(result) = self.fetch_json3(video_id, language).await? {
            return Ok(result);
        }

        if let Some(result) = self.fetch_vtt(video_id, language).await? {
            return Ok(result);
        }

        Err(CoreError::FetchFailed(
            "local yt-dlp service could not extract subtitles".to_string(),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
