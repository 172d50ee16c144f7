//! Contact record types.
//!
//! The application works with a flat key-value view of a contact; the
//! vendor keeps a nested, grouped record. Conversion between the two lives
//! in the vendor gateway crates; this module only defines the shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The application's flat contact representation.
///
/// A single-level map of application field name to scalar value, plus an
/// optional `newsletters` entry (see [`NewsletterChange`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatContact(BTreeMap<String, Value>);

impl FlatContact {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Get a field as a string slice, if present and a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Get a field as a bool, if present and a bool.
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.0.get(field).and_then(Value::as_bool)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Whether the field is present.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Parse the `newsletters` entry, if any.
    pub fn newsletters(&self) -> Option<NewsletterChange> {
        self.0
            .get("newsletters")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Replace the `newsletters` entry.
    pub fn set_newsletters(&mut self, change: NewsletterChange) {
        let value = match change {
            NewsletterChange::List(slugs) => {
                Value::Array(slugs.into_iter().map(Value::String).collect())
            }
            NewsletterChange::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::Bool(v))).collect())
            }
        };
        self.0.insert("newsletters".to_string(), value);
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for FlatContact {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A requested change to newsletter subscriptions.
///
/// Callers send either a plain list of slugs (everything listed is a
/// subscription request) or a map of slug to desired state (partial
/// updates, mixing subscribes and unsubscribes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NewsletterChange {
    /// Subscribe to every listed slug.
    List(Vec<String>),
    /// Set each slug to the given subscription state.
    Map(BTreeMap<String, bool>),
}

/// One newsletter entry in the vendor's nested record.
///
/// Outbound we only ever send name and desired state; the vendor tracks
/// format, language, and source on its side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsletterSubscription {
    pub name: String,
    pub subscribed: bool,
}
