//! CTMS HTTP client.
//!
//! One request core with single 401 re-auth semantics; thin record
//! operations on top. The client maps transport status codes onto the
//! error taxonomy but never interprets business-level error bodies; that
//! is the orchestrator's job.

use crate::auth::CtmsAuth;
use crate::config::CtmsConfig;
use corral_core::{EmailId, KeyValueCache, SyncError, SyncResult};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Client for the CTMS REST API.
#[derive(Clone)]
pub struct CtmsClient {
    api_url: String,
    http: Client,
    auth: CtmsAuth,
}

impl CtmsClient {
    /// Create a client from validated configuration.
    pub fn new(config: CtmsConfig, cache: Arc<dyn KeyValueCache>) -> SyncResult<Self> {
        crate::fields::verify_field_table()?;
        let config = config.validated()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("corral-ctms/1.0")
            .build()
            .map_err(|e| {
                SyncError::invalid_config(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            api_url: config.api_url.clone(),
            auth: CtmsAuth::new(config, cache),
            http,
        })
    }

    /// Base API URL (scheme and authority only).
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Perform one API request with automatic single re-auth.
    ///
    /// A 401 response invalidates the shared token, re-authenticates once,
    /// and replays the identical request; a second 401 propagates as an
    /// authentication error.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> SyncResult<Value> {
        let token = self.auth.bearer_token(&self.http).await?;
        let response = self.send(method.clone(), path, query, body, &token).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            debug!(path, "vendor rejected token, re-authenticating once");
            let token = self.auth.refresh(&self.http).await?;
            self.send(method, path, query, body, &token).await?
        } else {
            response
        };

        Self::handle_response(response, path).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> SyncResult<reqwest::Response> {
        let url = format!("{}{}", self.api_url, path);
        let mut builder = self.http.request(method, &url).bearer_auth(token);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(json) = body {
            builder = builder.json(json);
        }
        builder
            .send()
            .await
            .map_err(|e| SyncError::transient_with_source(format!("request to {path} failed"), e))
    }

    async fn handle_response(response: reqwest::Response, path: &str) -> SyncResult<Value> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| SyncError::transient_with_source("invalid JSON body", e));
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::UNAUTHORIZED => {
                SyncError::auth(format!("authentication rejected: {body}"))
            }
            StatusCode::NOT_FOUND => SyncError::NotFound {
                resource: path.to_string(),
            },
            StatusCode::CONFLICT => SyncError::Duplicate {
                identifier: path.to_string(),
            },
            StatusCode::TOO_MANY_REQUESTS => SyncError::RateLimited {
                retry_after_secs: retry_after,
            },
            s if s.is_server_error() => {
                SyncError::transient(format!("vendor returned {status}: {body}"))
            }
            _ => SyncError::Http {
                status: status.as_u16(),
                body,
            },
        })
    }

    // ── Record operations ─────────────────────────────────────────────

    /// `GET /ctms/{email_id}`: fetch one contact by its vendor id.
    pub async fn get_by_email_id(&self, email_id: &EmailId) -> SyncResult<Value> {
        self.request(Method::GET, &format!("/ctms/{email_id}"), &[], None)
            .await
    }

    /// `GET /ctms?{param}={value}`: list contacts matching one alternate
    /// identifier.
    pub async fn search_by_alternate_id(
        &self,
        param: &'static str,
        value: &str,
    ) -> SyncResult<Vec<Value>> {
        let result = self
            .request(Method::GET, "/ctms", &[(param, value.to_string())], None)
            .await?;
        serde_json::from_value(result).map_err(SyncError::from)
    }

    /// `POST /ctms`: create a contact. The vendor assigns the email id if
    /// the payload does not carry one.
    pub async fn create(&self, contact: &Value) -> SyncResult<Value> {
        self.request(Method::POST, "/ctms", &[], Some(contact)).await
    }

    /// `PUT /ctms/{email_id}`: replace a contact wholesale.
    pub async fn replace_by_email_id(
        &self,
        email_id: &EmailId,
        contact: &Value,
    ) -> SyncResult<Value> {
        self.request(
            Method::PUT,
            &format!("/ctms/{email_id}"),
            &[],
            Some(contact),
        )
        .await
    }
}
