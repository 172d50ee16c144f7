//! The task envelope: maintenance gate, lock, body, classification.

use crate::lock::TaskLock;
use crate::maintenance::MaintenancePolicy;
use crate::policy::{IgnoreLists, RetryPolicy};
use crate::queue::{FailureStore, TaskQueue};
use corral_core::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One invocation of a named task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInvocation {
    /// Dotted task name, e.g. `sync.upsert_contact`.
    pub name: String,
    /// JSON arguments, round-tripped through the external queue.
    pub args: Value,
    /// Zero-based attempt counter; the queue carries it across re-runs.
    #[serde(default)]
    pub attempt: u32,
}

impl TaskInvocation {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
            attempt: 0,
        }
    }

    /// The same invocation, one attempt later.
    #[must_use]
    pub fn next_attempt(&self) -> Self {
        Self {
            name: self.name.clone(),
            args: self.args.clone(),
            attempt: self.attempt + 1,
        }
    }
}

/// Where one pass through the envelope ended up.
///
/// `RetryScheduled` is the only non-terminal outcome; the queue will bring
/// the invocation back with the attempt counter bumped.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The body ran to completion (or its failure was on the never-retry
    /// list and was swallowed as a no-op).
    Completed,
    /// Maintenance mode deferred the invocation to the durable queue.
    MaintenanceQueued,
    /// Read-only mode dropped the invocation.
    Dropped,
    /// A transient failure was re-enqueued with backoff.
    RetryScheduled { delay: Duration },
    /// Retries exhausted on an error the no-alert list covers.
    FailedIgnored { error: String },
    /// Fatal failure, recorded for operators.
    FailedFatal { error: String },
}

impl TaskOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskOutcome::RetryScheduled { .. })
    }
}

/// Executes task bodies inside the maintenance / lock / retry pipeline.
#[derive(Clone)]
pub struct TaskEnvelope {
    queue: Arc<dyn TaskQueue>,
    failures: Arc<dyn FailureStore>,
    lock: TaskLock,
    retry: RetryPolicy,
    ignore: IgnoreLists,
    maintenance: MaintenancePolicy,
}

impl TaskEnvelope {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        failures: Arc<dyn FailureStore>,
        lock: TaskLock,
    ) -> Self {
        Self {
            queue,
            failures,
            lock,
            retry: RetryPolicy::default(),
            ignore: IgnoreLists::default(),
            maintenance: MaintenancePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_ignore_lists(mut self, ignore: IgnoreLists) -> Self {
        self.ignore = ignore;
        self
    }

    #[must_use]
    pub fn with_maintenance(mut self, maintenance: MaintenancePolicy) -> Self {
        self.maintenance = maintenance;
        self
    }

    /// Run a task body through the full pipeline.
    ///
    /// `lock_key` is the contact identity to serialize on (email or
    /// token); tasks that mutate nothing contact-scoped pass `None`.
    ///
    /// Errors from the queue or failure store propagate; everything the
    /// body raises is classified into a [`TaskOutcome`].
    pub async fn execute<F, Fut>(
        &self,
        invocation: &TaskInvocation,
        lock_key: Option<&str>,
        body: F,
    ) -> SyncResult<TaskOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        if self.maintenance.gates(&invocation.name) {
            if self.maintenance.read_only_mode {
                info!(task = %invocation.name, "read-only mode, dropping task");
                return Ok(TaskOutcome::Dropped);
            }
            info!(task = %invocation.name, "maintenance mode, queuing task");
            self.failures
                .record_queued_task(&invocation.name, &invocation.args)
                .await?;
            return Ok(TaskOutcome::MaintenanceQueued);
        }

        let result = async {
            if let Some(key) = lock_key {
                self.lock.acquire(key).await?;
            }
            body().await
        }
        .await;

        match result {
            Ok(()) => Ok(TaskOutcome::Completed),
            Err(error) => self.classify(invocation, error).await,
        }
    }

    /// Decide what a failed execution becomes.
    async fn classify(
        &self,
        invocation: &TaskInvocation,
        error: SyncError,
    ) -> SyncResult<TaskOutcome> {
        if self.ignore.matches_never_retry(&error) {
            debug!(
                task = %invocation.name,
                error = %error,
                "error on never-retry list, treating as no-op"
            );
            return Ok(TaskOutcome::Completed);
        }

        if self.retry.should_retry(invocation.attempt, &error) {
            let delay = self.retry.delay_for(invocation.attempt);
            debug!(
                task = %invocation.name,
                attempt = invocation.attempt + 1,
                max_retries = self.retry.max_retries,
                delay_secs = delay.as_secs(),
                error = %error,
                "scheduling retry"
            );
            self.queue
                .submit(invocation.next_attempt(), Some(delay))
                .await?;
            return Ok(TaskOutcome::RetryScheduled { delay });
        }

        if error.is_transient() && self.ignore.matches_no_alert(&error) {
            warn!(
                task = %invocation.name,
                attempts = invocation.attempt + 1,
                error = %error,
                "retries exhausted on ignorable error"
            );
            return Ok(TaskOutcome::FailedIgnored {
                error: error.to_string(),
            });
        }

        warn!(
            task = %invocation.name,
            attempts = invocation.attempt + 1,
            error = %error,
            code = error.error_code(),
            "task failed"
        );
        self.failures
            .record_failed_task(&invocation.name, &invocation.args, &error.to_string())
            .await?;
        Ok(TaskOutcome::FailedFatal {
            error: error.to_string(),
        })
    }
}
