//! Vocaminary Captions Core Engine
//!
//! Core subtitle pipeline module.
//! Handles caption parsing, segmentation, multi-tier cache resolution,
//! rate-limit gating, and the caller-facing fetch orchestrator.

pub mod auth;
pub mod cache;
pub mod captions;
pub mod fetcher;
pub mod remote;
pub mod resolver;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
