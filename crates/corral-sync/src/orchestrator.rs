//! The sync orchestrator: business operations over the vendor gateways.

use crate::newsletters::{compute_states, requested_newsletters, ApiCallKind};
use corral_core::{
    ContactToken, EmailId, FlatContact, KeyValueCache, NewsletterChange, NewsletterRegistry,
    SyncError, SyncResult,
};
use corral_ctms::resolver::{resolve, ContactIdentifier};
use corral_ctms::{from_vendor, ContactMapper, CtmsClient};
use corral_sfmc::SfmcClient;
use corral_tasks::{TaskInvocation, TaskQueue};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Orchestrator-level policy knobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Newsletter every verified account is signed up for when it opts in.
    #[serde(default)]
    pub registration_newsletter: Option<String>,

    /// Login campaign identifier to newsletter slug.
    #[serde(default)]
    pub login_campaigns: BTreeMap<String, String>,
}

/// Composes identity resolution, record conversion, and the vendor
/// gateways into the operations external callers invoke (through the task
/// envelope).
#[derive(Clone)]
pub struct SyncOrchestrator {
    pub(crate) ctms: CtmsClient,
    pub(crate) sfmc: SfmcClient,
    pub(crate) mapper: ContactMapper,
    pub(crate) registry: Arc<dyn NewsletterRegistry>,
    pub(crate) cache: Arc<dyn KeyValueCache>,
    pub(crate) queue: Arc<dyn TaskQueue>,
    pub(crate) config: SyncConfig,
}

impl SyncOrchestrator {
    pub fn new(
        ctms: CtmsClient,
        sfmc: SfmcClient,
        registry: Arc<dyn NewsletterRegistry>,
        cache: Arc<dyn KeyValueCache>,
        queue: Arc<dyn TaskQueue>,
        config: SyncConfig,
    ) -> Self {
        Self {
            ctms,
            sfmc,
            mapper: ContactMapper::new(registry.clone()),
            registry,
            cache,
            queue,
            config,
        }
    }

    /// Use a mapper with non-default language handling.
    #[must_use]
    pub fn with_mapper(mut self, mapper: ContactMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Look up one contact by a single identifier.
    ///
    /// "Not found" is a valid `None` here, including for direct id
    /// fetches.
    pub async fn get_contact_by_identifier(
        &self,
        identifier: ContactIdentifier,
    ) -> SyncResult<Option<FlatContact>> {
        match resolve(&self.ctms, &[identifier]).await {
            Ok(found) => Ok(found.map(|nested| from_vendor(&nested))),
            Err(SyncError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create or update a contact from an inbound payload.
    ///
    /// Returns the contact's token and whether a record was created.
    pub async fn upsert_contact(
        &self,
        kind: ApiCallKind,
        data: &FlatContact,
    ) -> SyncResult<(ContactToken, bool)> {
        let existing = self.resolve_existing(data).await?;
        let existing_flat = existing.as_ref().map(from_vendor);

        let mut update = data.clone();
        let forced_optin = data.get_bool("optin").unwrap_or(false);

        // callers send free-form format strings; the vendor knows H and T
        if let Some(format) = data.get_str("format") {
            let normalized = if format.trim().to_uppercase().starts_with('T') {
                "T"
            } else {
                "H"
            };
            update.insert("format", normalized);
        }

        let requested = requested_newsletters(data);
        let current = existing_flat.as_ref().and_then(|flat| {
            match flat.newsletters() {
                Some(NewsletterChange::List(slugs)) => Some(slugs),
                _ => None,
            }
        });
        let states = compute_states(kind, &requested, current.as_deref());
        update.set_newsletters(NewsletterChange::Map(states.clone()));

        let already_opted_in = existing_flat
            .as_ref()
            .and_then(|flat| flat.get_bool("optin"))
            .unwrap_or(false);

        if kind != ApiCallKind::Unsubscribe {
            let to_subscribe: Vec<String> = states
                .iter()
                .filter(|(_, subscribed)| **subscribed)
                .map(|(slug, _)| slug.clone())
                .collect();

            // any requested newsletter that skips double opt-in confirms
            // the whole contact immediately
            if !to_subscribe.is_empty() && !(forced_optin || already_opted_in) {
                let exempt = to_subscribe
                    .iter()
                    .any(|slug| !self.registry.requires_double_opt_in(slug));
                if exempt {
                    update.insert("optin", true);
                }
            }

            self.record_signup_sources(kind, data, existing_flat.as_ref(), &requested, &to_subscribe)
                .await?;
        }

        match existing {
            None => self.create_contact(update).await,
            Some(existing) => {
                if forced_optin && !already_opted_in {
                    update.insert("optin", true);
                }
                // they opted out before but are subscribing again
                if kind != ApiCallKind::Unsubscribe
                    && existing_flat
                        .as_ref()
                        .and_then(|flat| flat.get_bool("optout"))
                        .unwrap_or(false)
                {
                    update.insert("optout", false);
                }

                let token = match existing_flat
                    .as_ref()
                    .and_then(|flat| flat.get_str("token"))
                    .and_then(|raw| ContactToken::parse(raw).ok())
                {
                    Some(token) => token,
                    None => {
                        let token = ContactToken::generate();
                        update.insert("token", token.to_string());
                        token
                    }
                };

                self.apply_update(&existing, &update).await?;
                Ok((token, false))
            }
        }
    }

    /// Create a new contact, falling back to an update when the vendor
    /// reports the email is already taken (its search index can lag its
    /// writes).
    async fn create_contact(&self, mut update: FlatContact) -> SyncResult<(ContactToken, bool)> {
        let Some(email) = update.get_str("email").map(str::to_string) else {
            return Err(SyncError::invalid_argument(
                "email is required to create a contact",
            ));
        };

        let token = ContactToken::generate();
        update.insert("token", token.to_string());
        let nested = self.mapper.to_vendor(&update)?;

        match self.ctms.create(&nested).await {
            Ok(_) => Ok((token, true)),
            Err(SyncError::Duplicate { .. }) => {
                debug!(email = %email, "vendor reports duplicate, updating instead");
                update.remove("token");
                let existing = resolve(&self.ctms, &[ContactIdentifier::Email(email)])
                    .await?
                    .ok_or_else(|| SyncError::retry("duplicate contact not searchable yet"))?;
                let token = match from_vendor(&existing)
                    .get_str("token")
                    .and_then(|raw| ContactToken::parse(raw).ok())
                {
                    Some(token) => token,
                    None => {
                        let token = ContactToken::generate();
                        update.insert("token", token.to_string());
                        token
                    }
                };
                self.apply_update(&existing, &update).await?;
                Ok((token, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Merge changes into the existing vendor record and replace it.
    pub(crate) async fn apply_update(
        &self,
        existing: &Value,
        changes: &FlatContact,
    ) -> SyncResult<Value> {
        let email_id = existing["email"]["email_id"]
            .as_str()
            .ok_or_else(|| SyncError::invalid_argument("existing contact has no email_id"))?;
        let update = self.mapper.to_vendor(changes)?;
        let merged = merge_nested(existing, &update);
        self.ctms
            .replace_by_email_id(&EmailId::new(email_id), &merged)
            .await
    }

    async fn resolve_existing(&self, data: &FlatContact) -> SyncResult<Option<Value>> {
        let mut identifiers = Vec::new();
        if let Some(token) = data.get_str("token") {
            identifiers.push(ContactIdentifier::Token(token.to_string()));
        }
        if let Some(email) = data.get_str("email") {
            identifiers.push(ContactIdentifier::Email(email.to_string()));
        }
        if identifiers.is_empty() {
            return Err(SyncError::invalid_argument(
                "an email or token is required to upsert a contact",
            ));
        }
        resolve(&self.ctms, &identifiers).await
    }

    /// Queue a signup-source record for every newsletter this call
    /// touches. Subscribes record all requested slugs; preference-center
    /// sets record only the new ones.
    async fn record_signup_sources(
        &self,
        kind: ApiCallKind,
        data: &FlatContact,
        existing: Option<&FlatContact>,
        requested: &[String],
        to_subscribe: &[String],
    ) -> SyncResult<()> {
        let email = data
            .get_str("email")
            .or_else(|| existing.and_then(|flat| flat.get_str("email")));
        let Some(email) = email else {
            return Ok(());
        };

        let slugs = if kind == ApiCallKind::Subscribe {
            requested
        } else {
            to_subscribe
        };
        let valid = self.registry.valid_slugs();
        for slug in slugs.iter().filter(|slug| valid.contains(*slug)) {
            let args = json!({
                "email": email,
                "source_url": data.get("source_url"),
                "newsletter": slug,
            });
            self.queue
                .submit(TaskInvocation::new("sync.record_source_url", args), None)
                .await?;
        }
        Ok(())
    }
}

/// Merge an outbound update into an existing nested record, group by
/// group. Newsletter entries are matched by name: known entries get their
/// subscription flag updated, new ones are appended.
pub(crate) fn merge_nested(existing: &Value, update: &Value) -> Value {
    let mut merged = existing.clone();
    let (Some(merged_obj), Some(update_obj)) = (merged.as_object_mut(), update.as_object()) else {
        return update.clone();
    };

    for (key, value) in update_obj {
        if key == "newsletters" {
            let entries = merged_obj
                .entry("newsletters")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let (Some(entries), Some(changes)) = (entries.as_array_mut(), value.as_array()) {
                for change in changes {
                    let name = change["name"].as_str();
                    match entries
                        .iter_mut()
                        .find(|entry| entry["name"].as_str() == name)
                    {
                        Some(entry) => {
                            entry["subscribed"] = change["subscribed"].clone();
                        }
                        None => entries.push(change.clone()),
                    }
                }
            }
            continue;
        }

        match (
            merged_obj.get_mut(key).and_then(Value::as_object_mut),
            value.as_object(),
        ) {
            (Some(group), Some(members)) => {
                group.extend(members.clone());
            }
            _ => {
                merged_obj.insert(key.clone(), value.clone());
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_nested_extends_groups() {
        let existing = json!({
            "email": {"email_id": "abc", "primary_email": "a@example.com", "double_opt_in": false},
            "fxa": {"fxa_id": "f-1"}
        });
        let update = json!({
            "email": {"double_opt_in": true, "mailing_country": "us"}
        });
        let merged = merge_nested(&existing, &update);
        assert_eq!(merged["email"]["primary_email"], "a@example.com");
        assert_eq!(merged["email"]["double_opt_in"], true);
        assert_eq!(merged["email"]["mailing_country"], "us");
        assert_eq!(merged["fxa"]["fxa_id"], "f-1");
    }

    #[test]
    fn test_merge_nested_updates_newsletter_entries() {
        let existing = json!({
            "newsletters": [
                {"name": "a", "subscribed": true, "lang": "en"},
                {"name": "b", "subscribed": true}
            ]
        });
        let update = json!({
            "newsletters": [
                {"name": "b", "subscribed": false},
                {"name": "c", "subscribed": true}
            ]
        });
        let merged = merge_nested(&existing, &update);
        let entries = merged["newsletters"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["subscribed"], true);
        // existing per-newsletter data survives a flag change
        assert_eq!(entries[0]["lang"], "en");
        assert_eq!(entries[1]["subscribed"], false);
        assert_eq!(entries[2]["name"], "c");
    }

    #[test]
    fn test_merge_nested_adds_new_groups() {
        let existing = json!({"email": {"email_id": "abc"}});
        let update = json!({"vpn_waitlist": {"geo": "fr"}});
        let merged = merge_nested(&existing, &update);
        assert_eq!(merged["vpn_waitlist"]["geo"], "fr");
        assert_eq!(merged["email"]["email_id"], "abc");
    }
}
