//! Caption Data Models
//!
//! Defines data structures for the caption pipeline, plus the two leaf
//! utilities everything else builds on: whitespace tokenization with
//! trailing-punctuation splitting, and VTT timestamp parsing.

use serde::{Deserialize, Serialize};

use crate::core::TimeSec;

// =============================================================================
// Word
// =============================================================================

/// Trailing characters split off into [`Word::punctuation`]
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// A single displayed word, clickable in the overlay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    /// Word text without trailing punctuation
    pub text: String,
    /// Zero or one trailing character out of `.,!?;:`
    #[serde(default)]
    pub punctuation: String,
}

impl Word {
    /// Rejoins text and punctuation as originally written
    pub fn rendered(&self) -> String {
        format!("{}{}", self.text, self.punctuation)
    }
}

/// Tokenizes text on whitespace, splitting one trailing punctuation
/// character off each token.
pub fn tokenize(text: &str) -> Vec<Word> {
    text.split_whitespace()
        .map(|token| match token.chars().last() {
            Some(last) if TRAILING_PUNCTUATION.contains(&last) => Word {
                text: token[..token.len() - last.len_utf8()].to_string(),
                punctuation: last.to_string(),
            },
            _ => Word {
                text: token.to_string(),
                punctuation: String::new(),
            },
        })
        .collect()
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parses a VTT-style timestamp into seconds.
///
/// Accepts `H:M:S.mmm`, `M:S.mmm`, and bare-seconds forms; commas are
/// normalized to dots. Returns `None` on anything unparseable - callers
/// drop the cue rather than failing the track.
pub fn parse_vtt_time(timestamp: &str) -> Option<TimeSec> {
    let normalized = timestamp.trim().replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();

    match parts.len() {
        3 => {
            let hours: f64 = parts[0].parse().ok()?;
            let minutes: f64 = parts[1].parse().ok()?;
            let seconds: f64 = parts[2].parse().ok()?;
            Some(hours * 3600.0 + minutes * 60.0 + seconds)
        }
        2 => {
            let minutes: f64 = parts[0].parse().ok()?;
            let seconds: f64 = parts[1].parse().ok()?;
            Some(minutes * 60.0 + seconds)
        }
        1 => parts[0].parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Captions
// =============================================================================

/// A timed caption record as extracted from a subtitle track, before
/// segmentation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCaption {
    /// Start time in seconds
    pub start: TimeSec,
    /// End time in seconds (always > start)
    pub end: TimeSec,
    /// Full cue text, whitespace-collapsed
    pub text: String,
    /// Tokenization of `text`
    pub words: Vec<Word>,
    /// Position within the parsed track
    pub original_index: usize,
}

impl RawCaption {
    /// Creates a raw caption, tokenizing the text
    pub fn new(start: TimeSec, end: TimeSec, text: impl Into<String>, original_index: usize) -> Self {
        let text = text.into();
        let words = tokenize(&text);
        Self {
            start,
            end,
            text,
            words,
            original_index,
        }
    }

    /// Duration of this caption in seconds
    pub fn duration(&self) -> TimeSec {
        self.end - self.start
    }
}

/// A display-ready caption unit after length/duration bounding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Start time in seconds
    pub start: TimeSec,
    /// End time in seconds
    pub end: TimeSec,
    /// Displayed text
    pub text: String,
    /// Word sequence for per-word interaction
    pub words: Vec<Word>,
}

impl Segment {
    /// Duration of this segment in seconds
    pub fn duration(&self) -> TimeSec {
        self.end - self.start
    }

    /// True if the segment is visible at the given time
    pub fn is_visible_at(&self, time_sec: TimeSec) -> bool {
        time_sec >= self.start && time_sec < self.end
    }
}

impl From<RawCaption> for Segment {
    fn from(caption: RawCaption) -> Self {
        Self {
            start: caption.start,
            end: caption.end,
            text: caption.text,
            words: caption.words,
        }
    }
}

// =============================================================================
// Caption Metadata
// =============================================================================

/// Provenance class of a caption track
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptionKind {
    /// Human-authored transcript; timing is trusted as-is
    Manual,
    /// Auto-generated captions; timings are padded upstream
    AutoGenerated,
    /// Parsed from a VTT track
    Vtt,
    /// Provenance not reported
    #[default]
    Unknown,
}

impl CaptionKind {
    /// Maps a free-form `subtitle_type` string from the extraction service
    pub fn from_wire(subtitle_type: &str) -> Self {
        match subtitle_type {
            "manual" => Self::Manual,
            "auto-generated" | "auto" | "generated" => Self::AutoGenerated,
            "vtt" => Self::Vtt,
            _ => Self::Unknown,
        }
    }
}

/// Metadata describing the active segment sequence
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionData {
    /// Language code (e.g. "en")
    pub language: String,
    /// Provenance class
    #[serde(default, rename = "type")]
    pub kind: CaptionKind,
    /// Source identifier (e.g. "vocaminary", "local-ytdlp")
    pub source: String,
    /// Number of caption units
    pub count: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Tokenization Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_tokenize_basic() {
        let words = tokenize("Hello world");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Hello");
        assert_eq!(words[0].punctuation, "");
        assert_eq!(words[1].text, "world");
    }

    #[test]
    fn test_tokenize_splits_trailing_punctuation() {
        let words = tokenize("Wait, what?");
        assert_eq!(words[0].text, "Wait");
        assert_eq!(words[0].punctuation, ",");
        assert_eq!(words[1].text, "what");
        assert_eq!(words[1].punctuation, "?");
    }

    #[test]
    fn test_tokenize_only_last_punctuation_char() {
        // Only a single trailing character is split off
        let words = tokenize("wait...");
        assert_eq!(words[0].text, "wait..");
        assert_eq!(words[0].punctuation, ".");
    }

    #[test]
    fn test_tokenize_collapses_whitespace() {
        let words = tokenize("  a \t b\n c  ");
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_word_rendered() {
        let word = Word {
            text: "home".to_string(),
            punctuation: ",".to_string(),
        };
        assert_eq!(word.rendered(), "home,");
    }

    // -------------------------------------------------------------------------
    // Timestamp Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_vtt_time_forms() {
        assert_eq!(parse_vtt_time("00:00:01.500"), Some(1.5));
        assert_eq!(parse_vtt_time("01:30:00.000"), Some(5400.0));
        assert_eq!(parse_vtt_time("01:23.456"), Some(83.456));
        assert_eq!(parse_vtt_time("42.5"), Some(42.5));
    }

    #[test]
    fn test_parse_vtt_time_comma_separator() {
        assert_eq!(parse_vtt_time("00:00:01,500"), Some(1.5));
    }

    #[test]
    fn test_parse_vtt_time_invalid() {
        assert_eq!(parse_vtt_time("00:00:invalid"), None);
        assert_eq!(parse_vtt_time("a:b:c:d"), None);
        assert_eq!(parse_vtt_time(""), None);
    }

    // -------------------------------------------------------------------------
    // Model Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_raw_caption_tokenizes() {
        let caption = RawCaption::new(1.0, 2.5, "Hello world", 0);
        assert_eq!(caption.words.len(), 2);
        assert_eq!(caption.duration(), 1.5);
    }

    #[test]
    fn test_segment_visibility() {
        let segment = Segment {
            start: 2.0,
            end: 5.0,
            text: "Test".to_string(),
            words: tokenize("Test"),
        };
        assert!(!segment.is_visible_at(1.0));
        assert!(segment.is_visible_at(2.0));
        assert!(!segment.is_visible_at(5.0));
    }

    #[test]
    fn test_caption_kind_from_wire() {
        assert_eq!(CaptionKind::from_wire("manual"), CaptionKind::Manual);
        assert_eq!(CaptionKind::from_wire("auto"), CaptionKind::AutoGenerated);
        assert_eq!(CaptionKind::from_wire("???"), CaptionKind::Unknown);
    }

    #[test]
    fn test_caption_data_serialization_uses_type_field() {
        let data = CaptionData {
            language: "en".to_string(),
            kind: CaptionKind::Manual,
            source: "vocaminary".to_string(),
            count: 10,
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"type\":\"manual\""));
        let parsed: CaptionData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, data);
    }
}
