//! Caption Pipeline Module
//!
//! Turns raw caption data into display-ready segments:
//! - Caption data models (Word, RawCaption, Segment, CaptionData)
//! - WebVTT cue extraction
//! - Length/duration-bounded segmentation with natural break points
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Caption Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  models.rs     - Data structures, tokenization, time parsing     │
//! │  vtt.rs        - WebVTT cue extraction                           │
//! │  segmenter.rs  - Natural-break segmentation engine               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod models;
mod segmenter;
mod vtt;

pub use models::{
    parse_vtt_time, tokenize, CaptionData, CaptionKind, RawCaption, Segment, Word,
};
pub use segmenter::{
    segment_caption, segment_captions, segmentation_stats, SegmentLimits, SegmentationStats,
};
pub use vtt::parse_vtt;
