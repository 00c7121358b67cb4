//! WebVTT Cue Extraction
//!
//! Converts raw subtitle-track text into a sequence of timed raw captions.
//! Tolerant by design: malformed timestamp lines drop the cue, never the
//! track, and cues with no remaining text after markup stripping are
//! skipped.

use std::sync::OnceLock;

use regex::Regex;

use super::models::{parse_vtt_time, RawCaption};

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{2}:\d{2}:\d{2}\.\d{3})\s+-->\s+(\d{2}:\d{2}:\d{2}\.\d{3})")
            .expect("timestamp regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag regex"))
}

fn position_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"align:start position:\d+%").expect("position regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Strips inline markup and positioning directives, collapsing whitespace.
fn clean_cue_line(line: &str) -> String {
    let stripped = tag_re().replace_all(line.trim(), "");
    let stripped = position_re().replace_all(&stripped, "");
    whitespace_re().replace_all(&stripped, " ").trim().to_string()
}

/// Parses WebVTT-like content into ordered raw captions.
///
/// Scans for `HH:MM:SS.mmm --> HH:MM:SS.mmm` timestamp lines, accumulates
/// the following non-blank, non-timestamp lines as cue text, and joins them
/// with single spaces. Header lines (`WEBVTT`, metadata, cue identifiers)
/// fall through naturally because they never match the timestamp pattern.
pub fn parse_vtt(content: &str) -> Vec<RawCaption> {
    let lines: Vec<&str> = content.lines().collect();
    let mut captions = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.contains(" --> ") {
            if let Some(caps) = timestamp_re().captures(line) {
                let start = parse_vtt_time(&caps[1]);
                let end = parse_vtt_time(&caps[2]);

                if let (Some(start), Some(end)) = (start, end) {
                    // Collect cue text until a blank line or the next cue
                    let mut text_lines = Vec::new();
                    i += 1;
                    while i < lines.len()
                        && !lines[i].trim().is_empty()
                        && !lines[i].contains(" --> ")
                    {
                        let clean = clean_cue_line(lines[i]);
                        if !clean.is_empty() {
                            text_lines.push(clean);
                        }
                        i += 1;
                    }

                    let full_text = text_lines.join(" ").trim().to_string();
                    if !full_text.is_empty() {
                        captions.push(RawCaption::new(start, end, full_text, captions.len()));
                    }
                    continue;
                }
            }
            // Malformed timestamp line: drop the cue, keep scanning
        }
        i += 1;
    }

    captions
}

// =============================================================================
// Tests
// =============================================================================
