//! Conversion between the vendor's nested record and the flat application
//! record.
//!
//! Inbound (`from_vendor`) is forgiving: unknown groups and fields are
//! dropped so vendor schema additions never break us. Outbound
//! (`to_vendor`) is strict: the application vocabulary is closed and an
//! unknown field name is an error, so typos and schema drift surface
//! immediately instead of silently losing data.

use crate::fields::{
    self, by_app_field, group_rows, FieldRule, COUNTRY_ALIASES, COUNTRY_CODES,
};
use corral_core::{
    FlatContact, NewsletterChange, NewsletterRegistry, NewsletterSubscription, SyncError,
    SyncResult,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Convert a vendor nested record to the application's flat form.
///
/// Only fields with an application counterpart are carried over; the
/// `newsletters` group becomes the list of currently subscribed slugs.
pub fn from_vendor(contact: &Value) -> FlatContact {
    let mut flat = FlatContact::new();
    let Some(groups) = contact.as_object() else {
        return flat;
    };

    for (group_name, group_value) in groups {
        if group_name == "newsletters" {
            let subscribed: Vec<Value> = group_value
                .as_array()
                .map(|entries| {
                    entries
                        .iter()
                        .filter(|e| e["subscribed"].as_bool() == Some(true))
                        .filter_map(|e| e["name"].as_str())
                        .map(|name| Value::String(name.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            flat.insert("newsletters", Value::Array(subscribed));
            continue;
        }

        let Some(group_obj) = group_value.as_object() else {
            continue;
        };
        for mapping in group_rows(group_name) {
            if let Some(app) = mapping.app {
                if let Some(value) = group_obj.get(mapping.vendor) {
                    flat.insert(app, value.clone());
                }
            }
        }
    }
    flat
}

/// Maps flat application records into the vendor's nested form.
///
/// Holds the newsletter registry (for slug and language validation) and the
/// deployment's extra supported languages.
#[derive(Clone)]
pub struct ContactMapper {
    registry: Arc<dyn NewsletterRegistry>,
    extra_languages: Vec<String>,
}

impl ContactMapper {
    pub fn new(registry: Arc<dyn NewsletterRegistry>) -> Self {
        Self {
            registry,
            extra_languages: Vec::new(),
        }
    }

    /// Languages accepted verbatim in addition to the registry's codes
    /// (regional scripts the two-letter reduction would mangle).
    #[must_use]
    pub fn with_extra_languages(
        mut self,
        langs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.extra_languages = langs.into_iter().map(Into::into).collect();
        self
    }

    /// Convert a flat application record to the vendor's nested form.
    ///
    /// Validation is per-field: strings are trimmed and truncated, country
    /// and language codes normalized or omitted, newsletters filtered to
    /// known slugs. Ignored fields are skipped silently; anything else
    /// unrecognized fails with [`SyncError::UnknownField`].
    pub fn to_vendor(&self, flat: &FlatContact) -> SyncResult<Value> {
        let mut groups: BTreeMap<&'static str, Map<String, Value>> = BTreeMap::new();
        let mut newsletters: Option<Value> = None;

        for (field, value) in flat.iter() {
            if field == "newsletters" {
                let entries = self.newsletter_entries(value);
                if !entries.is_empty() {
                    newsletters = Some(serde_json::to_value(entries)?);
                }
                continue;
            }

            if fields::is_ignored_outbound(field) {
                continue;
            }

            let Some(mapping) = by_app_field(field) else {
                return Err(SyncError::UnknownField {
                    field: field.clone(),
                });
            };

            if let Some(prepared) = apply_rule(mapping.rule, value, self) {
                groups
                    .entry(mapping.group)
                    .or_default()
                    .insert(mapping.vendor.to_string(), prepared);
            }
        }

        let mut nested = Map::new();
        for (group, members) in groups {
            nested.insert(group.to_string(), Value::Object(members));
        }
        if let Some(entries) = newsletters {
            nested.insert("newsletters".to_string(), entries);
        }
        Ok(Value::Object(nested))
    }

    /// Expand the `newsletters` field into wire entries, dropping slugs the
    /// registry does not know.
    fn newsletter_entries(&self, value: &Value) -> Vec<NewsletterSubscription> {
        let valid = self.registry.valid_slugs();
        match serde_json::from_value::<NewsletterChange>(value.clone()) {
            Ok(NewsletterChange::List(slugs)) => slugs
                .into_iter()
                .filter(|slug| valid.contains(slug))
                .map(|name| NewsletterSubscription {
                    name,
                    subscribed: true,
                })
                .collect(),
            Ok(NewsletterChange::Map(map)) => map
                .into_iter()
                .filter(|(slug, _)| valid.contains(slug))
                .map(|(name, subscribed)| NewsletterSubscription { name, subscribed })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn normalize_language(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self
            .extra_languages
            .iter()
            .any(|extra| extra.eq_ignore_ascii_case(trimmed))
        {
            return Some(trimmed.to_string());
        }
        let prefix: String = trimmed.chars().take(2).collect::<String>().to_lowercase();
        let supported = self.registry.languages();
        if supported
            .iter()
            .any(|lang| lang.to_lowercase().starts_with(&prefix))
        {
            return Some(prefix);
        }
        None
    }
}

/// Apply a field rule to an outbound value. `None` means the field is
/// omitted from the vendor record.
fn apply_rule(rule: FieldRule, value: &Value, mapper: &ContactMapper) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    match rule {
        FieldRule::Text { max } => match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Value::String(trimmed.chars().take(max).collect()))
                }
            }
            other => Some(other.clone()),
        },
        FieldRule::Scalar => Some(value.clone()),
        FieldRule::Country => value.as_str().and_then(normalize_country).map(Value::String),
        FieldRule::Language => value
            .as_str()
            .and_then(|s| mapper.normalize_language(s))
            .map(Value::String),
    }
}

fn normalize_country(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    let code = COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map_or(lowered.as_str(), |(_, code)| *code);
    if COUNTRY_CODES.binary_search(&code).is_ok() {
        Some(code.to_string())
    } else {
        None
    }
}
