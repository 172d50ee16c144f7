//! Newsletter subscription-state computation.

use corral_core::FlatContact;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of API call drove an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCallKind {
    Subscribe,
    Unsubscribe,
    Set,
}

/// Read the requested newsletter slugs from an inbound payload.
///
/// Form submissions send a comma-separated string; API callers send a
/// list. Both collapse to a slug list here.
pub fn requested_newsletters(data: &FlatContact) -> Vec<String> {
    match data.get("newsletters") {
        Some(serde_json::Value::String(csv)) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Compute per-slug subscription flags from the requested slugs and the
/// contact's current subscriptions.
///
/// - `Subscribe` turns every requested slug on.
/// - `Unsubscribe` turns a requested slug off only if currently on.
/// - `Set` turns requested slugs on and every other current one off.
pub fn compute_states(
    kind: ApiCallKind,
    requested: &[String],
    current: Option<&[String]>,
) -> BTreeMap<String, bool> {
    let mut states = BTreeMap::new();
    match kind {
        ApiCallKind::Subscribe => {
            for slug in requested {
                states.insert(slug.clone(), true);
            }
        }
        ApiCallKind::Unsubscribe => {
            if let Some(current) = current {
                for slug in requested {
                    if current.contains(slug) {
                        states.insert(slug.clone(), false);
                    }
                }
            }
        }
        ApiCallKind::Set => {
            for slug in requested {
                states.insert(slug.clone(), true);
            }
            if let Some(current) = current {
                for slug in current {
                    if !requested.contains(slug) {
                        states.insert(slug.clone(), false);
                    }
                }
            }
        }
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slugs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_requested_from_csv() {
        let data = FlatContact::new().with("newsletters", "app-weekly, beta ,,product-news");
        assert_eq!(
            requested_newsletters(&data),
            slugs(&["app-weekly", "beta", "product-news"])
        );
    }

    #[test]
    fn test_requested_from_list() {
        let data = FlatContact::new().with("newsletters", json!(["app-weekly", "beta"]));
        assert_eq!(requested_newsletters(&data), slugs(&["app-weekly", "beta"]));
    }

    #[test]
    fn test_subscribe_marks_requested_true() {
        let states = compute_states(
            ApiCallKind::Subscribe,
            &slugs(&["a", "b"]),
            Some(&slugs(&["b", "c"])),
        );
        assert_eq!(states, BTreeMap::from([("a".into(), true), ("b".into(), true)]));
    }

    #[test]
    fn test_unsubscribe_only_touches_current() {
        let states = compute_states(
            ApiCallKind::Unsubscribe,
            &slugs(&["a", "b"]),
            Some(&slugs(&["b", "c"])),
        );
        assert_eq!(states, BTreeMap::from([("b".into(), false)]));
    }

    #[test]
    fn test_unsubscribe_without_current_is_empty() {
        let states = compute_states(ApiCallKind::Unsubscribe, &slugs(&["a"]), None);
        assert!(states.is_empty());
    }

    #[test]
    fn test_set_replaces_subscriptions() {
        let states = compute_states(
            ApiCallKind::Set,
            &slugs(&["a", "b"]),
            Some(&slugs(&["b", "c"])),
        );
        assert_eq!(
            states,
            BTreeMap::from([("a".into(), true), ("b".into(), true), ("c".into(), false)])
        );
    }
}
