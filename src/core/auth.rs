//! Rate-Limit Authentication
//!
//! The rate-limit service identifies callers by bearer token. Signed-in
//! users carry a configured token; anonymous users get a synthesized token
//! derived from a persisted per-installation id, so their quota windows
//! survive restarts.

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::Rng;
use tracing::{debug, warn};

use super::{now_ms, CoreError, CoreResult};

const ANON_ID_FILE: &str = "anon_id";
const ANON_ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ANON_ID_SUFFIX_LEN: usize = 9;

/// Produces bearer tokens for the rate-limit service.
#[derive(Debug)]
pub struct AuthTokenProvider {
    configured: Option<String>,
    state_dir: PathBuf,
}

impl AuthTokenProvider {
    /// `configured` is the user's token, if any; `state_dir` holds the
    /// persisted anonymous id for tokenless installations.
    pub fn new(configured: Option<String>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            configured: configured.filter(|t| !t.trim().is_empty()),
            state_dir: state_dir.into(),
        }
    }

    /// True when a real user token is configured.
    pub fn has_user_token(&self) -> bool {
        self.configured.is_some()
    }

    /// Returns the bearer token: the configured one, or an anonymous token
    /// of the form `base64("{anon_id}:{epoch_ms}")`.
    pub async fn bearer_token(&self) -> CoreResult<String> {
        if let Some(token) = &self.configured {
            return Ok(token.clone());
        }

        let anon_id = self.get_or_create_anon_id().await?;
        Ok(BASE64.encode(format!("{}:{}", anon_id, now_ms())))
    }

    /// Loads the persisted anonymous id, generating and persisting a fresh
    /// one on first use.
    pub async fn get_or_create_anon_id(&self) -> CoreResult<String> {
        let path = self.state_dir.join(ANON_ID_FILE);

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let id = contents.trim().to_string();
                if !id.is_empty() {
                    return Ok(id);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(%err, "anonymous id unreadable, regenerating");
            }
        }

        let id = generate_anon_id();
        tokio::fs::create_dir_all(&self.state_dir)
            .await
            .map_err(|err| CoreError::Internal(format!("create state dir: {err}")))?;
        tokio::fs::write(&path, &id)
            .await
            .map_err(|err| CoreError::Internal(format!("persist anonymous id: {err}")))?;

        debug!(anon_id = %id, "generated anonymous id");
        Ok(id)
    }
}

fn generate_anon_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ANON_ID_SUFFIX_LEN)
        .map(|_| ANON_ID_CHARSET[rng.gen_range(0..ANON_ID_CHARSET.len())] as char)
        .collect();
    format!("temp_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anon_id_shape() {
        let id = generate_anon_id();
        assert!(id.starts_with("temp_"));
        assert_eq!(id.len(), "temp_".len() + ANON_ID_SUFFIX_LEN);
        assert!(id["temp_".len()..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_configured_token_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = AuthTokenProvider::new(Some("user-token".to_string()), tmp.path());

        assert!(provider.has_user_token());
        assert_eq!(provider.bearer_token().await.unwrap(), "user-token");
    }

    #[tokio::test]
    async fn test_blank_configured_token_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = AuthTokenProvider::new(Some("  ".to_string()), tmp.path());
        assert!(!provider.has_user_token());
    }

    #[tokio::test]
    async fn test_anon_id_persists_across_providers() {
        let tmp = tempfile::tempdir().unwrap();

        let first = AuthTokenProvider::new(None, tmp.path())
            .get_or_create_anon_id()
            .await
            .unwrap();
        let second = AuthTokenProvider::new(None, tmp.path())
            .get_or_create_anon_id()
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_anonymous_token_decodes_to_id_and_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = AuthTokenProvider::new(None, tmp.path());

        let token = provider.bearer_token().await.unwrap();
        let decoded = String::from_utf8(BASE64.decode(token).unwrap()).unwrap();
        let (id, ts) = decoded.split_once(':').unwrap();

        assert!(id.starts_with("temp_"));
        assert!(ts.parse::<i64>().unwrap() > 0);
    }
}
