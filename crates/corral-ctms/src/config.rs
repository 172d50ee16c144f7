//! CTMS gateway configuration.

use corral_core::{SyncError, SyncResult};
use serde::Deserialize;

/// Configuration for the CTMS gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct CtmsConfig {
    /// Base API URL. Only scheme and authority are kept; any path or query
    /// on the configured value is discarded.
    pub api_url: String,

    /// OAuth2 client id.
    pub client_id: String,

    /// OAuth2 client secret.
    pub client_secret: String,

    /// Cache key the bearer token is shared under across workers.
    #[serde(default = "default_token_cache_key")]
    pub token_cache_key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_cache_key() -> String {
    "ctms_token".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl CtmsConfig {
    /// Validate the configuration and normalize `api_url` down to
    /// `scheme://authority`.
    pub fn validated(mut self) -> SyncResult<Self> {
        let url: reqwest::Url = self
            .api_url
            .parse()
            .map_err(|e| SyncError::invalid_config(format!("invalid api_url: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::invalid_config("api_url has no host"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::invalid_config("api_url must be http(s)"));
        }
        self.api_url = match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        };

        if self.client_id.is_empty() {
            return Err(SyncError::invalid_config("client_id is empty"));
        }
        if self.client_secret.is_empty() {
            return Err(SyncError::invalid_config("client_secret is empty"));
        }
        if self.token_cache_key.is_empty() {
            return Err(SyncError::invalid_config("token_cache_key is empty"));
        }
        Ok(self)
    }

    /// The vendor's token endpoint.
    pub fn token_url(&self) -> String {
        format!("{}/token", self.api_url)
    }
}
