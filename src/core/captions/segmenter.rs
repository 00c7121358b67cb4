//! Caption Segmentation Engine
//!
//! Rewrites raw caption records into display-ready segments bounded by
//! word-count and duration limits, preferring linguistically natural break
//! points (sentence endings, clause punctuation, conjunctions) over
//! mid-phrase splits. Segment timing is linearly interpolated from the
//! parent caption's time span.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::models::{RawCaption, Segment, Word};
use crate::core::TimeSec;

// =============================================================================
// Limits
// =============================================================================

/// Segmentation policy limits.
///
/// `ideal_*` is the target a caption may keep without splitting; `max_*` is
/// the hard bound no produced segment may exceed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentLimits {
    /// Hard word-count bound per segment
    pub max_words: usize,
    /// Hard duration bound per segment (seconds)
    pub max_duration: TimeSec,
    /// Target word count per segment
    pub ideal_words: usize,
    /// Target duration per segment (seconds)
    pub ideal_duration: TimeSec,
}

impl Default for SegmentLimits {
    fn default() -> Self {
        Self {
            max_words: 12,
            max_duration: 3.5,
            ideal_words: 8,
            ideal_duration: 2.5,
        }
    }
}

// =============================================================================
// Natural Breaks
// =============================================================================

/// A candidate break position within caption text.
///
/// `position` is the byte offset just past the matched pattern; lower
/// `priority` is linguistically stronger.
#[derive(Clone, Copy, Debug)]
struct BreakPoint {
    position: usize,
    priority: u32,
}

/// Break patterns in priority order: sentence end, clause punctuation,
/// comma, coordinating conjunction, relative marker, preposition.
fn break_patterns() -> &'static [(Regex, u32)] {
    static PATTERNS: OnceLock<Vec<(Regex, u32)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"[.!?]\s+").expect("sentence pattern"), 1),
            (Regex::new(r"[;:]\s+").expect("clause pattern"), 2),
            (Regex::new(r",\s+").expect("comma pattern"), 3),
            (
                Regex::new(r"(?i)\s+(?:and|but|or|so|because|since)\s+")
                    .expect("conjunction pattern"),
                4,
            ),
            (
                Regex::new(r"(?i)\s+(?:then|when|where|while|which|that)\s+")
                    .expect("relative pattern"),
                5,
            ),
            (
                Regex::new(r"(?i)\s+(?:to|of|in|on|at|for|with)\s+")
                    .expect("preposition pattern"),
                6,
            ),
        ]
    })
}

/// Finds all natural break candidates, position-sorted and deduplicated.
/// When two patterns end at the same position the stronger one wins.
fn natural_breaks(text: &str) -> Vec<BreakPoint> {
    let mut breaks = Vec::new();
    for (pattern, priority) in break_patterns() {
        for m in pattern.find_iter(text) {
            breaks.push(BreakPoint {
                position: m.end(),
                priority: *priority,
            });
        }
    }

    breaks.sort_by_key(|b| b.position);
    breaks.dedup_by_key(|b| b.position);
    breaks
}

/// Picks `num_breaks` positions that best approximate even spacing.
///
/// Each ideal slot greedily takes the unused candidate minimizing
/// `|position - ideal| + priority * 10`, so a nearby strong break beats an
/// exactly-placed weak one.
fn select_optimal_breaks(text_len: usize, breaks: &[BreakPoint], num_breaks: usize) -> Vec<usize> {
    if breaks.len() <= num_breaks {
        return breaks.iter().map(|b| b.position).collect();
    }

    let ideal_interval = text_len as f64 / (num_breaks + 1) as f64;
    let mut selected: Vec<usize> = Vec::with_capacity(num_breaks);

    for slot in 1..=num_breaks {
        let target = ideal_interval * slot as f64;
        let mut best: Option<(usize, f64)> = None;

        for candidate in breaks {
            if selected.contains(&candidate.position) {
                continue;
            }
            let distance = (candidate.position as f64 - target).abs();
            let score = distance + candidate.priority as f64 * 10.0;
            if best.map_or(true, |(_, best_score)| score < best_score) {
                best = Some((candidate.position, score));
            }
        }

        if let Some((position, _)) = best {
            selected.push(position);
        }
    }

    selected.sort_unstable();
    selected
}

// =============================================================================
// Segmentation
// =============================================================================

/// Segments a full caption track.
pub fn segment_captions(captions: &[RawCaption], limits: &SegmentLimits) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(captions.len());
    for caption in captions {
        segments.extend(segment_caption(caption, limits));
    }
    segments
}

/// Segments one raw caption into bounded display units.
///
/// Captions already within the ideal limits pass through unchanged. A
/// caption with no words produces no segments.
pub fn segment_caption(caption: &RawCaption, limits: &SegmentLimits) -> Vec<Segment> {
    if caption.words.is_empty() {
        return Vec::new();
    }

    let duration = caption.duration();
    if caption.words.len() <= limits.ideal_words && duration <= limits.ideal_duration {
        return vec![caption.clone().into()];
    }

    let segments_by_words = caption.words.len().div_ceil(limits.ideal_words);
    let segments_by_duration = (duration / limits.ideal_duration).ceil() as usize;
    let target_segments = segments_by_words.max(segments_by_duration);

    let breaks = natural_breaks(&caption.text);
    if !breaks.is_empty() && target_segments > 1 {
        let selected = select_optimal_breaks(caption.text.len(), &breaks, target_segments - 1);
        let natural = segment_at_breaks(
            caption.start,
            caption.end,
            &caption.text,
            &caption.words,
            &selected,
            limits,
        );
        if !natural.is_empty() {
            return natural;
        }
    }

    chunk_by_words(caption.start, caption.end, &caption.words, limits)
}

/// Builds segments between consecutive chosen break positions, mapping each
/// character span onto its word subsequence. A span that still violates the
/// hard limits degrades to the word-count fallback for that span only.
fn segment_at_breaks(
    start: TimeSec,
    end: TimeSec,
    text: &str,
    words: &[Word],
    selected: &[usize],
    limits: &SegmentLimits,
) -> Vec<Segment> {
    let duration = end - start;
    let text_len = text.len() as f64;
    let mut segments = Vec::new();

    let mut last_position = 0usize;
    let mut word_index = 0usize;

    for &break_position in selected.iter().chain(std::iter::once(&text.len())) {
        let span_text = text[last_position..break_position].trim();
        if span_text.is_empty() {
            continue;
        }

        // Consume the words falling inside this span, located by their
        // rendered form from the last consumed position onward.
        let mut span_words: Vec<Word> = Vec::new();
        while word_index < words.len() {
            let token = words[word_index].rendered();
            match text[last_position..].find(&token) {
                Some(offset) if last_position + offset < break_position => {
                    span_words.push(words[word_index].clone());
                    word_index += 1;
                }
                _ => break,
            }
        }

        let span_start = start + (last_position as f64 / text_len) * duration;
        let span_end = start + (break_position as f64 / text_len) * duration;

        if !span_words.is_empty() {
            if span_words.len() <= limits.max_words
                && span_end - span_start <= limits.max_duration
            {
                segments.push(Segment {
                    start: span_start,
                    end: span_end,
                    text: span_text.to_string(),
                    words: span_words,
                });
            } else {
                segments.extend(chunk_by_words(span_start, span_end, &span_words, limits));
            }
        }

        last_position = break_position;
    }

    segments
}

/// Word-count fallback: partitions the word sequence into ideal-sized
/// chunks (hard-capped), interpolating chunk timing by word position.
fn chunk_by_words(
    start: TimeSec,
    end: TimeSec,
    words: &[Word],
    limits: &SegmentLimits,
) -> Vec<Segment> {
    let total_words = words.len();
    let duration = end - start;
    let mut segments = Vec::new();
    let mut index = 0usize;

    while index < total_words {
        let chunk_size = limits
            .ideal_words
            .min(total_words - index)
            .min(limits.max_words);

        let chunk_words = &words[index..index + chunk_size];
        let chunk_text = chunk_words
            .iter()
            .map(Word::rendered)
            .collect::<Vec<_>>()
            .join(" ");

        let progress = index as f64 / total_words as f64;
        let next_progress = ((index + chunk_size) as f64 / total_words as f64).min(1.0);

        segments.push(Segment {
            start: start + progress * duration,
            end: start + next_progress * duration,
            text: chunk_text,
            words: chunk_words.to_vec(),
        });

        index += chunk_size;
    }

    segments
}

// =============================================================================
// Statistics
// =============================================================================

/// Summary of a segmentation pass, logged for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationStats {
    pub total_segments: usize,
    pub avg_words: f64,
    pub avg_duration: f64,
    pub max_words: usize,
    pub max_duration: f64,
    pub over_limit_count: usize,
}

/// Computes and logs summary statistics for a segment sequence.
pub fn segmentation_stats(segments: &[Segment], limits: &SegmentLimits) -> SegmentationStats {
    if segments.is_empty() {
        return SegmentationStats::default();
    }

    let mut total_words = 0usize;
    let mut total_duration = 0.0;
    let mut max_words = 0usize;
    let mut max_duration: f64 = 0.0;
    let mut over_limit_count = 0usize;

    for segment in segments {
        let words = segment.words.len();
        let duration = segment.duration();
        total_words += words;
        total_duration += duration;
        max_words = max_words.max(words);
        max_duration = max_duration.max(duration);
        if words > limits.max_words || duration > limits.max_duration {
            over_limit_count += 1;
        }
    }

    let stats = SegmentationStats {
        total_segments: segments.len(),
        avg_words: total_words as f64 / segments.len() as f64,
        avg_duration: total_duration / segments.len() as f64,
        max_words,
        max_duration,
        over_limit_count,
    };

    debug!(
        total_segments = stats.total_segments,
        avg_words = format!("{:.1}", stats.avg_words),
        avg_duration = format!("{:.1}s", stats.avg_duration),
        max_words = stats.max_words,
        max_duration = format!("{:.1}s", stats.max_duration),
        "segmentation summary"
    );
    if stats.over_limit_count > 0 {
        warn!(
            count = stats.over_limit_count,
            "segments exceeding limits after segmentation"
        );
    }

    stats
}

// =============================================================================
// Tests
// =============================================================================
