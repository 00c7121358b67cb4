//! Rate-Limit Admission Client
//!
//! Asks the usage service whether a fresh fetch is allowed before hitting
//! the transcript API. Cached loads never pass through here: only fetches
//! that cost upstream quota are gated.
//!
//! The check fails open. A denial requires an explicit `allowed: false`
//! from the service; transport failures and unexpected statuses allow the
//! fetch, because an unreachable quota endpoint must not take captions down
//! with it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{RateLimitDecision, RateLimitGate};
use crate::core::auth::AuthTokenProvider;
use crate::core::UsageSnapshot;

/// Gate backed by the cloud usage service.
pub struct RateLimitClient {
    api_base: String,
    auth: Arc<AuthTokenProvider>,
    client: reqwest::Client,
}

impl RateLimitClient {
    pub fn new(
        api_base: impl Into<String>,
        auth: Arc<AuthTokenProvider>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            auth,
            client,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRequest<'a> {
    video_id: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckResponse {
    /// Absent means allowed; only an explicit `false` denies
    #[serde(default)]
    allowed: Option<bool>,
    #[serde(default)]
    wait_time: Option<u64>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    usage: Option<UsageSnapshot>,
}

#[async_trait]
impl RateLimitGate for RateLimitClient {
    async fn check(&self, video_id: &str, language: &str) -> RateLimitDecision {
        let token = match self.auth.bearer_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(%err, "rate limit: token unavailable, allowing fetch");
                return RateLimitDecision::allow();
            }
        };

        let url = format!("{}/subtitles/fetch-or-cache", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&CheckRequest { video_id, language })
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "rate limit: check failed, allowing fetch");
                return RateLimitDecision::allow();
            }
        };

        let status = response.status();
        // 429 carries the denial body; other failures fail open
        if !status.is_success() && status.as_u16() != 429 {
            warn!(%status, "rate limit: unexpected status, allowing fetch");
            return RateLimitDecision::allow();
        }

        let body: CheckResponse = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                warn!(%err, "rate limit: unreadable response, allowing fetch");
                return RateLimitDecision::allow();
            }
        };

        let decision = RateLimitDecision {
            allowed: body.allowed.unwrap_or(true),
            wait_time_secs: body.wait_time.unwrap_or(0),
            reason: body.reason.unwrap_or_default(),
            usage: body.usage,
        };
        debug!(
            video_id,
            allowed = decision.allowed,
            wait_time_secs = decision.wait_time_secs,
            "rate limit: checked"
        );
        decision
    }
}
