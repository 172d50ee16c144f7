//! Per-identity mutual exclusion.
//!
//! The vendor's duplicate protection lags its own writes: releasing a lock
//! the moment a task finishes still allowed duplicate records, so the lock
//! is held for a fixed timeout rather than released explicitly. Contention
//! is a retryable condition, not a failure.

use corral_core::{KeyValueCache, SyncError, SyncResult};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Short-lived exclusive lock keyed by contact identity (email or token).
#[derive(Clone)]
pub struct TaskLock {
    cache: Arc<dyn KeyValueCache>,
    prefix: String,
    timeout: Duration,
    enabled: bool,
}

impl TaskLock {
    pub fn new(cache: Arc<dyn KeyValueCache>, timeout: Duration) -> Self {
        Self {
            cache,
            prefix: "task".to_string(),
            timeout,
            enabled: true,
        }
    }

    /// Use a different lock namespace.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Disable locking entirely (single-worker deployments).
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Try to take the lock for `key`.
    ///
    /// Succeeds silently or fails with a retryable [`SyncError::Retry`];
    /// the envelope turns that into a scheduled re-run.
    pub async fn acquire(&self, key: &str) -> SyncResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let lock_key = self.lock_key(key);
        if self.cache.add(&lock_key, json!(true), self.timeout).await {
            Ok(())
        } else {
            debug!(key = %lock_key, "lock already held, deferring task");
            Err(SyncError::retry("could not acquire lock"))
        }
    }

    /// Cache key for an identity: a hash, so raw emails never appear in
    /// the shared store.
    fn lock_key(&self, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("corral-{}-{}", self.prefix, key).as_bytes());
        hex::encode(hasher.finalize())
    }
}
