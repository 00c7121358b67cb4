//! Vocaminary Captions Core
//!
//! Subtitle acquisition, caching, and segmentation engine for the Vocaminary
//! browser extension. This library turns raw caption data (WebVTT text or
//! API-delivered transcript segments) into display-ready, time-aligned,
//! length-bounded caption units, and decides where those captions come from
//! through a layered cache/rate-limit resolution strategy.
//!
//! The presentation layer (overlay rendering, popup, DOM injection) is an
//! external collaborator: it calls [`core::fetcher::CaptionFetcher`] and
//! renders the resulting segment sequence.

pub mod core;

pub use crate::core::captions::{CaptionData, RawCaption, Segment, Word};
pub use crate::core::fetcher::{CaptionFetcher, FetchSummary};
pub use crate::core::resolver::{ResolvedSubtitles, SubtitleResolver};
pub use crate::core::settings::SubtitleSettings;
pub use crate::core::{CoreError, CoreResult};
