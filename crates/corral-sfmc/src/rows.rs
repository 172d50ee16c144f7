//! Data-extension row operations.
//!
//! Rows are addressed by data-extension key. Reads filter on the user's
//! token or email address; writes go through the vendor's rowset surface,
//! which inserts or updates based on the extension's key columns.

use crate::auth::SfmcAuth;
use crate::config::SfmcConfig;
use corral_core::{KeyValueCache, SyncError, SyncResult};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Search filter for row reads. The extension schema names these columns
/// `TOKEN` and `EMAIL_ADDRESS_`.
#[derive(Debug, Clone)]
pub enum RowFilter {
    Token(String),
    Email(String),
}

impl RowFilter {
    fn expression(&self) -> String {
        match self {
            RowFilter::Token(value) => format!("TOKEN eq '{value}'"),
            RowFilter::Email(value) => format!("EMAIL_ADDRESS_ eq '{value}'"),
        }
    }
}

/// One row destined for a data extension.
#[derive(Debug, Clone, Serialize)]
pub struct RowData {
    pub keys: Map<String, Value>,
    pub values: Map<String, Value>,
}

impl RowData {
    pub fn new(keys: Map<String, Value>, values: Map<String, Value>) -> Self {
        Self { keys, values }
    }
}

/// Client for the SFMC REST API.
#[derive(Clone)]
pub struct SfmcClient {
    pub(crate) rest_url: String,
    pub(crate) http: Client,
    pub(crate) auth: SfmcAuth,
}

impl SfmcClient {
    pub fn new(config: SfmcConfig, cache: Arc<dyn KeyValueCache>) -> SyncResult<Self> {
        let config = config.validated()?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("corral-sfmc/1.0")
            .build()
            .map_err(|e| {
                SyncError::invalid_config(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            rest_url: config.rest_url.clone(),
            auth: SfmcAuth::new(config, cache),
            http,
        })
    }

    /// Perform one REST request with automatic single re-auth on 401.
    pub(crate) async fn request(
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
            let token = self.auth.force_refresh(&self.http).await?;
            self.send(method, path, query, body, &token).await?
        } else {
            response
        };

        let status = response.status();
        if status.is_success() {
            if status == StatusCode::NO_CONTENT {
                return Ok(Value::Null);
            }
            return response
                .json()
                .await
                .map_err(|e| SyncError::transient_with_source("invalid JSON body", e));
        }

        let body_text = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => {
                SyncError::auth(format!("authentication rejected: {body_text}"))
            }
            s if s.is_server_error() => {
                SyncError::transient(format!("vendor returned {status}: {body_text}"))
            }
            _ => SyncError::Http {
                status: status.as_u16(),
                body: body_text,
            },
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> SyncResult<reqwest::Response> {
        let url = format!("{}{}", self.rest_url, path);
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

    // ── Row operations ────────────────────────────────────────────────

    /// Fetch one row from a data extension by token or email.
    ///
    /// Returns the row's columns flattened into one map, or `None` when
    /// nothing matches.
    pub async fn get_row(
        &self,
        de_name: &str,
        fields: &[&str],
        filter: RowFilter,
    ) -> SyncResult<Option<Map<String, Value>>> {
        let path = format!("/data/v1/customobjectdata/key:{de_name}/rowset");
        let query = [
            ("$fields", fields.join(",")),
            ("$filter", filter.expression()),
        ];
        let result = self.request(Method::GET, &path, &query, None).await?;

        let Some(item) = result["items"].as_array().and_then(|items| items.first()) else {
            return Ok(None);
        };
        let mut row = Map::new();
        for part in ["keys", "values"] {
            if let Some(obj) = item[part].as_object() {
                row.extend(obj.clone());
            }
        }
        Ok(Some(row))
    }

    /// Insert or update one row in a data extension.
    pub async fn upsert_row(&self, de_name: &str, row: RowData) -> SyncResult<()> {
        self.upsert_rows(de_name, &[row]).await
    }

    /// Insert or update a batch of rows in a data extension.
    pub async fn upsert_rows(&self, de_name: &str, rows: &[RowData]) -> SyncResult<()> {
        let path = format!("/hub/v1/dataevents/key:{de_name}/rowset");
        let body = serde_json::to_value(rows)?;
        self.request(Method::POST, &path, &[], Some(&body)).await?;
        Ok(())
    }

    /// Delete rows matching `column = value` from a data extension.
    pub async fn delete_row(&self, de_name: &str, column: &str, value: &str) -> SyncResult<()> {
        let path = format!("/data/v1/customobjectdata/key:{de_name}/rowset");
        let query = [("$filter", format!("{column} eq '{value}'"))];
        self.request(Method::DELETE, &path, &query, None).await?;
        Ok(())
    }
}
