//! SFMC token authentication.
//!
//! Tokens are shared across workers through the injected cache. A token is
//! reported expired between 5 and 6 minutes early, with the exact buffer
//! randomized per check so parallel workers do not all request a
//! replacement token in the same instant (the thundering-herd problem).

use crate::config::SfmcConfig;
use corral_core::{KeyValueCache, SyncError, SyncResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fixed part of the early-expiry buffer, in seconds.
const AUTH_BUFFER_SECS: i64 = 300;
/// Randomized part of the early-expiry buffer, in seconds.
const HERD_TIMEOUT_SECS: i64 = 60;
/// Extra cache lifetime past token expiry so the refresh token stays
/// usable.
const REFRESH_GRACE_SECS: u64 = 600;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest {
    client_id: String,
    client_secret: String,
    access_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenState {
    pub access_token: String,
    /// Unix timestamp the vendor-declared lifetime runs out at.
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenState {
    /// Whether the token should be treated as expired, buffer included.
    fn is_expired(&self, now: i64) -> bool {
        let buffer = rand::thread_rng().gen_range(1..=HERD_TIMEOUT_SECS) + AUTH_BUFFER_SECS;
        now + buffer > self.expires_at
    }
}

/// Authentication handler for the SFMC gateway.
#[derive(Clone)]
pub struct SfmcAuth {
    config: SfmcConfig,
    cache: Arc<dyn KeyValueCache>,
}

impl SfmcAuth {
    pub fn new(config: SfmcConfig, cache: Arc<dyn KeyValueCache>) -> Self {
        Self { config, cache }
    }

    /// Get a usable bearer token, requesting a new one when the cached
    /// token is missing or inside the expiry buffer.
    pub async fn bearer_token(&self, http: &reqwest::Client) -> SyncResult<String> {
        let now = chrono::Utc::now().timestamp();
        let cached: Option<TokenState> = match self.cache.get(&self.config.token_cache_key).await {
            Some(value) => serde_json::from_value(value).ok(),
            None => None,
        };

        if let Some(state) = &cached {
            if !state.is_expired(now) {
                return Ok(state.access_token.clone());
            }
        }

        self.request_token(http, cached.and_then(|s| s.refresh_token))
            .await
    }

    /// Drop the shared token and fetch a fresh one.
    pub async fn force_refresh(&self, http: &reqwest::Client) -> SyncResult<String> {
        self.cache.delete(&self.config.token_cache_key).await;
        self.request_token(http, None).await
    }

    /// Request a token, retrying once without the refresh token when the
    /// vendor declines it.
    async fn request_token(
        &self,
        http: &reqwest::Client,
        refresh_token: Option<String>,
    ) -> SyncResult<String> {
        let had_refresh = refresh_token.is_some();
        let payload = TokenRequest {
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            access_type: "offline",
            refresh_token,
        };

        debug!(auth_url = %self.config.auth_url, "requesting SFMC token");
        let response = http
            .post(&self.config.auth_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::auth(format!("token request failed: {e}")))?;
        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::auth(format!("token response was not JSON ({status}): {e}")))?;

        let Some(access_token) = body.access_token else {
            if had_refresh {
                // stored refresh token no longer honored
                return Box::pin(self.request_token(http, None)).await;
            }
            return Err(SyncError::auth(format!(
                "token endpoint returned {status} without an access token"
            )));
        };

        let expires_in = body.expires_in.unwrap_or(0).max(0);
        let state = TokenState {
            access_token: access_token.clone(),
            expires_at: chrono::Utc::now().timestamp() + expires_in,
            refresh_token: body.refresh_token,
        };
        self.cache
            .set(
                &self.config.token_cache_key,
                serde_json::to_value(&state)?,
                Duration::from_secs(expires_in as u64 + REFRESH_GRACE_SECS),
            )
            .await;

        Ok(access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_buffer_bounds() {
        let state = TokenState {
            access_token: "tok".to_string(),
            expires_at: 10_000,
            refresh_token: None,
        };
        // beyond any buffer: always live
        assert!(!state.is_expired(10_000 - 361));
        // inside the fixed buffer: always expired
        assert!(state.is_expired(10_000 - 300));
        assert!(state.is_expired(10_000));
    }

    #[test]
    fn test_token_request_omits_absent_refresh_token() {
        let payload = TokenRequest {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            access_type: "offline",
            refresh_token: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"clientId\":\"id\""));
        assert!(json.contains("\"accessType\":\"offline\""));
        assert!(!json.contains("refreshToken"));
    }
}
