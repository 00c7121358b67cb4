//! Usage and Health Telemetry
//!
//! Fire-and-forget reporting to the usage service: fetch outcomes for quota
//! accounting and transcript-API health samples for operator dashboards.
//! Every report runs on a spawned task; a failed send only bumps a counter
//! and never surfaces to the caption path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::auth::AuthTokenProvider;

/// Telemetry client for the usage service.
pub struct Telemetry {
    api_base: String,
    client: reqwest::Client,
    auth: Arc<AuthTokenProvider>,
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// Counters for reports attempted so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMetrics {
    pub sent: u64,
    pub dropped: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchReport {
    video_id: String,
    video_title: String,
    success: bool,
    source: String,
    from_cache: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiHealthReport {
    endpoint: &'static str,
    video_id: String,
    status_code: u16,
    response_time_ms: u64,
    success: bool,
    error_message: Option<String>,
}

impl Telemetry {
    pub fn new(
        api_base: impl Into<String>,
        client: reqwest::Client,
        auth: Arc<AuthTokenProvider>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            client,
            auth,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Reports a fetch outcome for quota accounting. Cached loads are never
    /// reported; they do not count toward usage.
    pub fn log_fetch(
        self: &Arc<Self>,
        video_id: &str,
        video_title: Option<&str>,
        success: bool,
        source: &str,
        from_cache: bool,
    ) {
        let report = FetchReport {
            video_id: video_id.to_string(),
            video_title: video_title.unwrap_or("Unknown").to_string(),
            success,
            source: source.to_string(),
            from_cache,
        };
        self.send_in_background("subtitles/log-fetch", report);
    }

    /// Reports one transcript-API response sample for health monitoring.
    pub fn log_api_health(
        self: &Arc<Self>,
        video_id: &str,
        status_code: u16,
        response_time_ms: u64,
        success: bool,
        error_message: Option<String>,
    ) {
        let report = ApiHealthReport {
            endpoint: "/transcript",
            video_id: video_id.to_string(),
            status_code,
            response_time_ms,
            success,
            error_message,
        };
        self.send_in_background("railway-health/log", report);
    }

    /// Counters for reports attempted so far.
    pub fn metrics(&self) -> TelemetryMetrics {
        TelemetryMetrics {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn send_in_background<T: Serialize + Send + 'static>(self: &Arc<Self>, path: &str, report: T) {
        let this = Arc::clone(self);
        let url = format!("{}/{}", self.api_base, path);

        tokio::spawn(async move {
            let token = match this.auth.bearer_token().await {
                Ok(token) => token,
                Err(err) => {
                    warn!(%err, "telemetry: token unavailable, dropping report");
                    this.dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            };

            let result = this
                .client
                .post(&url)
                .bearer_auth(token)
                .json(&report)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    this.sent.fetch_add(1, Ordering::Relaxed);
                    debug!(%url, "telemetry: report sent");
                }
                Ok(response) => {
                    this.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(%url, status = %response.status(), "telemetry: report rejected");
                }
                Err(err) => {
                    this.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(%url, %err, "telemetry: report failed");
                }
            }
        });
    }
}
