//! SFMC gateway configuration.

use corral_core::{SyncError, SyncResult};
use serde::Deserialize;

/// Configuration for the SFMC gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct SfmcConfig {
    /// Token endpoint URL.
    pub auth_url: String,

    /// REST API base URL.
    pub rest_url: String,

    pub client_id: String,
    pub client_secret: String,

    /// Cache key the auth token is shared under across workers.
    #[serde(default = "default_token_cache_key")]
    pub token_cache_key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_token_cache_key() -> String {
    "sfmc_token".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl SfmcConfig {
    /// Validate the configuration; the REST base URL keeps its path but
    /// loses any trailing slash.
    pub fn validated(mut self) -> SyncResult<Self> {
        for (name, value) in [("auth_url", &self.auth_url), ("rest_url", &self.rest_url)] {
            let url: reqwest::Url = value
                .parse()
                .map_err(|e| SyncError::invalid_config(format!("invalid {name}: {e}")))?;
            if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
                return Err(SyncError::invalid_config(format!("invalid {name}: {value}")));
            }
        }
        self.rest_url = self.rest_url.trim_end_matches('/').to_string();
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(SyncError::invalid_config("client credentials are empty"));
        }
        if self.token_cache_key.is_empty() {
            return Err(SyncError::invalid_config("token_cache_key is empty"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_and_normalization() {
        let config: SfmcConfig = serde_json::from_value(json!({
            "auth_url": "https://auth.sfmc.example.com/v2/token",
            "rest_url": "https://rest.sfmc.example.com/",
            "client_id": "id",
            "client_secret": "secret"
        }))
        .unwrap();
        let config = config.validated().unwrap();
        assert_eq!(config.rest_url, "https://rest.sfmc.example.com");
        assert_eq!(config.token_cache_key, "sfmc_token");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_rejects_bad_urls() {
        let config: SfmcConfig = serde_json::from_value(json!({
            "auth_url": "not a url",
            "rest_url": "https://rest.sfmc.example.com",
            "client_id": "id",
            "client_secret": "secret"
        }))
        .unwrap();
        assert!(config.validated().is_err());
    }
}
