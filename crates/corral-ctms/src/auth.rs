//! OAuth2 client-credentials authentication for the CTMS API.
//!
//! The bearer token is shared across workers through the injected
//! [`KeyValueCache`] under a fixed key, with a TTL at 95% of the
//! vendor-declared lifetime so a token never outlives its welcome mid-flight.

use crate::config::CtmsConfig;
use corral_core::{KeyValueCache, SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Token response from the vendor's token endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Fallback lifetime when the vendor omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 60;

/// Authentication handler for the CTMS gateway.
#[derive(Clone)]
pub struct CtmsAuth {
    config: CtmsConfig,
    cache: Arc<dyn KeyValueCache>,
}

impl CtmsAuth {
    pub fn new(config: CtmsConfig, cache: Arc<dyn KeyValueCache>) -> Self {
        Self { config, cache }
    }

    /// Get a bearer token, preferring the shared cache.
    pub async fn bearer_token(&self, http: &reqwest::Client) -> SyncResult<String> {
        if let Some(cached) = self.cache.get(&self.config.token_cache_key).await {
            if let Some(token) = cached.get("access_token").and_then(|v| v.as_str()) {
                return Ok(token.to_string());
            }
            // something wrong was cached
            self.cache.delete(&self.config.token_cache_key).await;
        }
        self.refresh(http).await
    }

    /// Fetch a fresh token from the vendor and store it in the shared cache.
    ///
    /// Called on cache miss and after a 401 response invalidates whatever
    /// the cache held.
    pub async fn refresh(&self, http: &reqwest::Client) -> SyncResult<String> {
        let token_url = self.config.token_url();
        debug!(token_url = %token_url, "fetching CTMS access token");

        let response = http
            .post(&token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SyncError::auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(SyncError::auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::auth(format!("failed to parse token response: {e}")))?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let ttl = Duration::from_secs(expires_in * 95 / 100);
        self.cache
            .set(
                &self.config.token_cache_key,
                serde_json::to_value(&token)?,
                ttl,
            )
            .await;

        Ok(token.access_token)
    }
}
