//! Handlers for events originating at the auth service.
//!
//! Each handler is one task body: the webhook layer deserializes the
//! payload, wraps the handler in the task envelope, and lets the envelope
//! classify failures.

use crate::orchestrator::SyncOrchestrator;
use corral_core::{FlatContact, KeyValueCache, SyncResult};
use corral_ctms::resolver::{resolve, ContactIdentifier};
use corral_sfmc::RowData;
use corral_tasks::{TaskInvocation, TaskQueue};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Data extension recording email changes on auth-service accounts.
const EMAIL_UPDATED_EXTENSION: &str = "FXA_EmailUpdated";
/// Data extension recording deleted auth-service accounts.
const DELETED_EXTENSION: &str = "FXA_Deleted";
/// Data extension holding verified-account info.
const ACCOUNT_EXTENSION: &str = "Firefox_Account_ID";
/// Data extension recording login activity.
const LOGIN_EXTENSION: &str = "Sync_Device_Logins";
/// Data extension recording where a subscription was signed up.
const SOURCE_URL_EXTENSION: &str = "NEWSLETTER_SOURCE_URLS";

/// How long an email-change timestamp is remembered for ordering.
const EMAIL_CHANGE_GUARD_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// The account's primary email changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailChangedEvent {
    pub uid: String,
    pub email: String,
    /// Event sequence timestamp from the auth service.
    pub ts: f64,
}

/// The account was deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDeletedEvent {
    pub uid: String,
}

/// A new account finished verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountVerifiedEvent {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub create_date: Option<String>,
    #[serde(default)]
    pub newsletters: Option<Vec<String>>,
    #[serde(default)]
    pub opt_in: bool,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// The account logged in on a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginEvent {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub device_count: u32,
    /// Campaign identifier from the login's metrics context.
    #[serde(default)]
    pub campaign: Option<String>,
}

fn row(keys: Value, values: Value) -> RowData {
    let as_map = |v: Value| -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    };
    RowData::new(as_map(keys), as_map(values))
}

impl SyncOrchestrator {
    /// Record an email change, guarded against out-of-order delivery.
    ///
    /// The guard is a cached per-account timestamp with a short TTL: best
    /// effort only, not an ordering guarantee. An event older than the
    /// cached timestamp is dropped.
    pub async fn handle_email_changed(&self, event: &EmailChangedEvent) -> SyncResult<()> {
        let guard_key = format!("fxa_email_changed:{}", event.uid);
        let previous = self
            .cache
            .get(&guard_key)
            .await
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        if previous > event.ts {
            debug!(uid = %event.uid, "email-change event older than last applied, skipping");
            return Ok(());
        }

        self.sfmc
            .upsert_row(
                EMAIL_UPDATED_EXTENSION,
                row(
                    json!({"FXA_ID": event.uid}),
                    json!({"NewEmailAddress": event.email}),
                ),
            )
            .await?;
        self.cache
            .set(&guard_key, json!(event.ts), EMAIL_CHANGE_GUARD_TTL)
            .await;
        Ok(())
    }

    /// Record an account deletion and flag the contact.
    pub async fn handle_account_deleted(&self, event: &AccountDeletedEvent) -> SyncResult<()> {
        self.sfmc
            .upsert_row(
                DELETED_EXTENSION,
                row(json!({"FXA_ID": event.uid}), json!({})),
            )
            .await?;

        let existing = resolve(
            &self.ctms,
            &[ContactIdentifier::FxaId(event.uid.clone())],
        )
        .await?;
        if let Some(existing) = existing {
            let changes = FlatContact::new().with("fxa_deleted", true);
            self.apply_update(&existing, &changes).await?;
        }
        Ok(())
    }

    /// Record a verified account and subscribe it to requested
    /// newsletters.
    pub async fn handle_account_verified(&self, event: &AccountVerifiedEvent) -> SyncResult<()> {
        let Some(locale) = event.locale.as_deref().map(str::trim).filter(|l| !l.is_empty())
        else {
            debug!(uid = %event.uid, "verified account has no locale, ignoring");
            return Ok(());
        };

        let mut values = json!({
            "EMAIL_ADDRESS_": event.email,
            "FXA_LANGUAGE_ISO2": locale,
            "SERVICE": event.service.clone().unwrap_or_default(),
        });
        if let Some(create_date) = &event.create_date {
            values["CREATED_DATE_"] = json!(create_date);
        }
        self.sfmc
            .upsert_row(
                ACCOUNT_EXTENSION,
                row(json!({"FXA_ID": event.uid}), values),
            )
            .await?;

        let mut to_subscribe = event.newsletters.clone().unwrap_or_default();
        if let Some(registration) = &self.config.registration_newsletter {
            if !to_subscribe.is_empty() {
                if !to_subscribe.contains(registration) {
                    to_subscribe.push(registration.clone());
                }
            } else if event.opt_in {
                to_subscribe.push(registration.clone());
            }
        }
        if to_subscribe.is_empty() {
            return Ok(());
        }

        let mut args = json!({
            "email": event.email,
            "lang": locale,
            "newsletters": to_subscribe,
        });
        if let Some(country) = &event.country {
            args["country"] = json!(country);
        }
        if let Some(source_url) = &event.source_url {
            args["source_url"] = json!(source_url);
        }
        self.queue
            .submit(
                TaskInvocation::new("sync.subscribe_contact", args),
                None,
            )
            .await
    }

    /// Record login activity; a recognized campaign triggers a
    /// subscription.
    pub async fn handle_login(&self, event: &LoginEvent) -> SyncResult<()> {
        self.sfmc
            .upsert_row(
                LOGIN_EXTENSION,
                row(
                    json!({"FXA_ID": event.uid}),
                    json!({
                        "SERVICE": event.service.clone().unwrap_or_default(),
                        "FIRST_DEVICE": if event.device_count == 1 { "y" } else { "n" },
                    }),
                ),
            )
            .await?;

        let newsletter = event
            .campaign
            .as_ref()
            .and_then(|campaign| self.config.login_campaigns.get(campaign));
        if let Some(newsletter) = newsletter {
            let args = json!({
                "email": event.email,
                "newsletters": [newsletter],
            });
            self.queue
                .submit(
                    TaskInvocation::new("sync.subscribe_contact", args),
                    None,
                )
                .await?;
        }
        Ok(())
    }

    /// Record which page a newsletter signup came from.
    pub async fn handle_record_source_url(
        &self,
        email: &str,
        source_url: Option<&str>,
        newsletter: &str,
    ) -> SyncResult<()> {
        let source_url = match source_url.map(str::trim).filter(|s| !s.is_empty()) {
            Some(url) => url.chars().take(1000).collect::<String>(),
            None => "__NONE__".to_string(),
        };
        self.sfmc
            .upsert_row(
                SOURCE_URL_EXTENSION,
                row(
                    json!({"Email": email, "Newsletter_Field_Name": newsletter}),
                    json!({"Signup_Source_URL__c": source_url}),
                ),
            )
            .await
    }
}
