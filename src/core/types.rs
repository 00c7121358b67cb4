//! Core Type Definitions
//!
//! Defines fundamental types used throughout the project.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// YouTube video identifier (11-character id)
pub type VideoId = String;

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Unix epoch timestamp in milliseconds
pub type EpochMs = i64;

/// Current time as epoch milliseconds
pub fn now_ms() -> EpochMs {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Rate-Limit Usage
// =============================================================================

/// Usage snapshot reported by the rate-limit service.
///
/// Each window is a `"used/total"` string (e.g. `"3/5"`); the limits
/// themselves are computed server-side, never by this core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    /// 5-minute burst window
    #[serde(default)]
    pub burst: Option<String>,
    /// Hourly window
    #[serde(default)]
    pub hourly: Option<String>,
    /// Daily window
    #[serde(default)]
    pub daily: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_snapshot_deserializes_wire_shape() {
        let usage: UsageSnapshot =
            serde_json::from_str(r#"{"burst":"3/5","hourly":"10/30","daily":"42/100"}"#).unwrap();
        assert_eq!(usage.burst.as_deref(), Some("3/5"));
        assert_eq!(usage.daily.as_deref(), Some("42/100"));
    }

    #[test]
    fn test_usage_snapshot_tolerates_missing_fields() {
        let usage: UsageSnapshot = serde_json::from_str(r#"{"burst":"1/5"}"#).unwrap();
        assert_eq!(usage.hourly, None);
        assert_eq!(usage.daily, None);
    }
}
