//! Core Error Definitions
//!
//! Defines error types used throughout the project.
//!
//! Errors are `Clone` by design: resolver outcomes are shared between
//! concurrent callers over a broadcast channel, so transport errors are
//! captured as `String` context instead of carrying foreign error sources.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::UsageSnapshot;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Upstream Error Kinds
// =============================================================================

/// Structured error categories reported by the cloud transcript API.
///
/// Split into user-side conditions (the viewer must pick another video) and
/// server-side conditions (the remote fetcher is unhealthy) so the
/// presentation layer can differentiate its messaging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    /// The video has no transcript in the requested language
    NoTranscript,
    /// Captions are disabled for the video
    TranscriptsDisabled,
    /// The video itself is unavailable (private, deleted, region-locked)
    VideoUnavailable,
    /// YouTube is blocking the remote fetcher's egress IP
    YoutubeIpBlocked,
    /// Generic server-side failure
    ServerError,
    /// Network failure between the cloud service and YouTube
    NetworkError,
    /// Anything the API did not classify
    Unknown,
}

impl UpstreamErrorKind {
    /// Maps the API's `error_type` string to a kind
    pub fn from_wire(error_type: &str) -> Self {
        match error_type {
            "no_transcript" => Self::NoTranscript,
            "transcripts_disabled" => Self::TranscriptsDisabled,
            "video_unavailable" => Self::VideoUnavailable,
            "youtube_ip_blocked" => Self::YoutubeIpBlocked,
            "server_error" => Self::ServerError,
            "network_error" => Self::NetworkError,
            _ => Self::Unknown,
        }
    }

    /// True when the viewer must pick another video; not retryable
    pub fn is_user_side(&self) -> bool {
        matches!(
            self,
            Self::NoTranscript | Self::TranscriptsDisabled | Self::VideoUnavailable
        )
    }

    /// True when the remote service itself is unhealthy
    pub fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::YoutubeIpBlocked | Self::ServerError | Self::NetworkError | Self::Unknown
        )
    }
}

impl std::fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoTranscript => "no_transcript",
            Self::TranscriptsDisabled => "transcripts_disabled",
            Self::VideoUnavailable => "video_unavailable",
            Self::YoutubeIpBlocked => "youtube_ip_blocked",
            Self::ServerError => "server_error",
            Self::NetworkError => "network_error",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// Core Errors
// =============================================================================

/// Core engine error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("No video ID provided")]
    MissingVideoId,

    // =========================================================================
    // Rate Limiting
    // =========================================================================
    #[error("Rate limited: wait {wait_time_secs}s ({reason})")]
    RateLimited {
        wait_time_secs: u64,
        reason: String,
        usage: Option<UsageSnapshot>,
    },

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    #[error("Upstream error ({kind}): {message}")]
    Upstream {
        kind: UpstreamErrorKind,
        message: String,
        /// Warp proxy status reported alongside IP-block errors
        warp_active: Option<bool>,
    },

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Failed to fetch subtitles: {0}")]
    FetchFailed(String),

    // =========================================================================
    // Cache Errors
    // =========================================================================
    #[error("Cache error: {0}")]
    Cache(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Maps a reqwest transport failure onto the error taxonomy
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else {
            Self::FetchFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_kind_from_wire() {
        assert_eq!(
            UpstreamErrorKind::from_wire("no_transcript"),
            UpstreamErrorKind::NoTranscript
        );
        assert_eq!(
            UpstreamErrorKind::from_wire("youtube_ip_blocked"),
            UpstreamErrorKind::YoutubeIpBlocked
        );
        assert_eq!(
            UpstreamErrorKind::from_wire("something_else"),
            UpstreamErrorKind::Unknown
        );
    }

    #[test]
    fn test_user_side_vs_server_side_split() {
        assert!(UpstreamErrorKind::NoTranscript.is_user_side());
        assert!(UpstreamErrorKind::TranscriptsDisabled.is_user_side());
        assert!(UpstreamErrorKind::VideoUnavailable.is_user_side());
        assert!(!UpstreamErrorKind::NoTranscript.is_server_side());

        assert!(UpstreamErrorKind::YoutubeIpBlocked.is_server_side());
        assert!(UpstreamErrorKind::ServerError.is_server_side());
        assert!(!UpstreamErrorKind::ServerError.is_user_side());
    }

    #[test]
    fn test_rate_limited_display() {
        let err = CoreError::RateLimited {
            wait_time_secs: 300,
            reason: "burst".to_string(),
            usage: None,
        };
        assert!(err.to_string().contains("300"));
    }
}
