//! Key-value cache capability.
//!
//! Cross-worker shared state (vendor credentials, per-identity locks, event
//! timestamp guards) goes through this trait. Deployments inject a real
//! distributed cache; [`MemoryCache`] backs tests and single-process runs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A shared key-value store with per-entry expiry.
///
/// `add` must be atomic: exactly one concurrent caller wins for a given
/// absent key. The per-identity task lock depends on that.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Get a live value.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Set a value with a time-to-live.
    async fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Set a value only if the key is absent. Returns `true` if this call
    /// stored the value.
    async fn add(&self, key: &str, value: Value, ttl: Duration) -> bool;

    /// Remove a key.
    async fn delete(&self, key: &str);
}

/// In-process cache with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
    }

    async fn add(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().await;
        let live = matches!(entries.get(key), Some((_, exp)) if *exp > Instant::now());
        if live {
            return false;
        }
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
        true
    }

    async fn delete(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache
            .set("k", json!({"a": 1}), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await, Some(json!({"a": 1})));
        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_add_is_exclusive() {
        let cache = MemoryCache::new();
        assert!(cache.add("lock", json!(true), Duration::from_secs(60)).await);
        assert!(!cache.add("lock", json!(true), Duration::from_secs(60)).await);
        cache.delete("lock").await;
        assert!(cache.add("lock", json!(true), Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_expired_entries_vanish() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_millis(0)).await;
        assert_eq!(cache.get("k").await, None);
        // an expired entry no longer blocks add
        cache.set("l", json!(1), Duration::from_millis(0)).await;
        assert!(cache.add("l", json!(2), Duration::from_secs(60)).await);
    }
}
