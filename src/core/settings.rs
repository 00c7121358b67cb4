//! Subtitle Pipeline Settings
//!
//! Configuration for the caption acquisition pipeline: service endpoints,
//! source preference, language priorities, and cache sizing.
//!
//! Settings are tolerant on load: `normalize()` corrects out-of-range values
//! instead of failing, so a stale or hand-edited config never breaks the
//! caption path.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default cloud rate-limit/usage API base
pub const DEFAULT_API_BASE: &str = "https://app.vocaminary.com/api";

/// Default cloud transcript API base
pub const DEFAULT_TRANSCRIPT_API: &str = "https://api.vocaminary.com";

/// Default local yt-dlp extraction service
pub const DEFAULT_YTDLP_SERVER: &str = "http://localhost:5000";

/// Cache retention window in days
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Bounded in-process cache size (videos)
pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 3;

// =============================================================================
// Source Preference
// =============================================================================

/// Which transcript source to use.
///
/// The cloud source, when selected, is tried exclusively: there is no
/// automatic fallback to the local extractor, since that requires a locally
/// running companion process the user has to opt into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePreference {
    /// Vocaminary cloud transcript API (default)
    #[default]
    Cloud,
    /// Locally running yt-dlp extraction service
    LocalYtdlp,
}

// =============================================================================
// Settings
// =============================================================================

/// Subtitle pipeline settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSettings {
    /// Rate-limit / usage-logging API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Cloud transcript API base URL
    #[serde(default = "default_transcript_api")]
    pub transcript_api: String,

    /// Local yt-dlp extraction service URL
    #[serde(default = "default_ytdlp_server")]
    pub ytdlp_server: String,

    /// Preferred transcript source
    #[serde(default)]
    pub preferred_source: SourcePreference,

    /// Languages to try, in priority order
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Bearer token for the rate-limit service; when absent a persisted
    /// anonymous identity is synthesized instead
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Directory holding the persistent subtitle cache and anonymous id
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Bounded in-process cache capacity (videos)
    #[serde(default = "default_memory_cache_size")]
    pub memory_cache_size: usize,

    /// Persistent cache retention window in days
    #[serde(default = "default_retention_days")]
    pub cache_retention_days: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_transcript_api() -> String {
    DEFAULT_TRANSCRIPT_API.to_string()
}

fn default_ytdlp_server() -> String {
    DEFAULT_YTDLP_SERVER.to_string()
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("vocaminary")
}

fn default_memory_cache_size() -> usize {
    DEFAULT_MEMORY_CACHE_SIZE
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            transcript_api: default_transcript_api(),
            ytdlp_server: default_ytdlp_server(),
            preferred_source: SourcePreference::default(),
            languages: default_languages(),
            auth_token: None,
            cache_dir: default_cache_dir(),
            memory_cache_size: default_memory_cache_size(),
            cache_retention_days: default_retention_days(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl SubtitleSettings {
    /// Normalizes and clamps settings so loaded state is always usable.
    pub fn normalize(&mut self) {
        trim_trailing_slash(&mut self.api_base);
        trim_trailing_slash(&mut self.transcript_api);
        trim_trailing_slash(&mut self.ytdlp_server);

        if self.api_base.is_empty() {
            self.api_base = default_api_base();
        }
        if self.transcript_api.is_empty() {
            self.transcript_api = default_transcript_api();
        }
        if self.ytdlp_server.is_empty() {
            self.ytdlp_server = default_ytdlp_server();
        }

        self.languages.retain(|l| !l.trim().is_empty());
        if self.languages.is_empty() {
            self.languages = default_languages();
        }

        self.memory_cache_size = self.memory_cache_size.clamp(1, 32);
        self.cache_retention_days = self.cache_retention_days.clamp(1, 90);
        self.request_timeout_secs = self.request_timeout_secs.clamp(5, 120);
    }
}

fn trim_trailing_slash(url: &mut String) {
    while url.ends_with('/') {
        url.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SubtitleSettings::default();
        assert_eq!(settings.preferred_source, SourcePreference::Cloud);
        assert_eq!(settings.languages, vec!["en"]);
        assert_eq!(settings.memory_cache_size, 3);
        assert_eq!(settings.cache_retention_days, 7);
    }

    #[test]
    fn test_normalize_clamps_and_fills() {
        let mut settings = SubtitleSettings {
            api_base: "https://example.com/api///".to_string(),
            languages: vec!["".to_string()],
            memory_cache_size: 0,
            cache_retention_days: 500,
            request_timeout_secs: 1,
            ..Default::default()
        };
        settings.normalize();

        assert_eq!(settings.api_base, "https://example.com/api");
        assert_eq!(settings.languages, vec!["en"]);
        assert_eq!(settings.memory_cache_size, 1);
        assert_eq!(settings.cache_retention_days, 90);
        assert_eq!(settings.request_timeout_secs, 5);
    }

    #[test]
    fn test_source_preference_wire_names() {
        let json = serde_json::to_string(&SourcePreference::LocalYtdlp).unwrap();
        assert_eq!(json, "\"local-ytdlp\"");
        let parsed: SourcePreference = serde_json::from_str("\"cloud\"").unwrap();
        assert_eq!(parsed, SourcePreference::Cloud);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let settings: SubtitleSettings =
            serde_json::from_str(r#"{"preferredSource":"local-ytdlp"}"#).unwrap();
        assert_eq!(settings.preferred_source, SourcePreference::LocalYtdlp);
        assert_eq!(settings.api_base, DEFAULT_API_BASE);
    }
}
