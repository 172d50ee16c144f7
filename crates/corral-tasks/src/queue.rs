//! Task queue and failure store capabilities.
//!
//! The scheduler itself lives outside this core; the envelope only needs
//! to hand work back to it. Likewise the durable store that keeps
//! maintenance-deferred invocations and exhausted failures for operators.

use crate::envelope::TaskInvocation;
use async_trait::async_trait;
use corral_core::SyncResult;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex;

/// Hands task invocations to the external scheduler.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task, optionally after a delay.
    async fn submit(&self, task: TaskInvocation, delay: Option<Duration>) -> SyncResult<()>;
}

/// Durable record of deferred and failed work, for replay and operator
/// visibility.
#[async_trait]
pub trait FailureStore: Send + Sync {
    /// Persist a maintenance-deferred invocation for later replay.
    async fn record_queued_task(&self, name: &str, args: &Value) -> SyncResult<()>;

    /// Persist a task that exhausted its retries or failed fatally.
    async fn record_failed_task(&self, name: &str, args: &Value, error: &str) -> SyncResult<()>;
}

/// Queue double that records submissions. For tests.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    pub submissions: Mutex<Vec<(TaskInvocation, Option<Duration>)>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn submit(&self, task: TaskInvocation, delay: Option<Duration>) -> SyncResult<()> {
        self.submissions.lock().await.push((task, delay));
        Ok(())
    }
}

/// Failure store double that records calls. For tests.
#[derive(Debug, Default)]
pub struct RecordingFailureStore {
    pub queued: Mutex<Vec<(String, Value)>>,
    pub failed: Mutex<Vec<(String, Value, String)>>,
}

impl RecordingFailureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FailureStore for RecordingFailureStore {
    async fn record_queued_task(&self, name: &str, args: &Value) -> SyncResult<()> {
        self.queued
            .lock()
            .await
            .push((name.to_string(), args.clone()));
        Ok(())
    }

    async fn record_failed_task(&self, name: &str, args: &Value, error: &str) -> SyncResult<()> {
        self.failed
            .lock()
            .await
            .push((name.to_string(), args.clone(), error.to_string()));
        Ok(())
    }
}
