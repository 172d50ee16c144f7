//! Maintenance-mode gate.
//!
//! Operators can halt vendor writes without losing work: while maintenance
//! mode is on, non-exempt task invocations are persisted for later replay.
//! Strict read-only mode drops them instead (nothing may be written
//! anywhere, including the replay queue).

use serde::Deserialize;
use std::collections::BTreeSet;

/// Deployment-level maintenance switches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenancePolicy {
    /// Defer vendor-mutating tasks instead of executing them.
    #[serde(default)]
    pub maintenance_mode: bool,

    /// With maintenance mode: drop deferred tasks instead of queuing them.
    #[serde(default)]
    pub read_only_mode: bool,

    /// Task names that run even during maintenance (time-sensitive sends).
    #[serde(default)]
    pub exempt_tasks: BTreeSet<String>,
}

impl MaintenancePolicy {
    /// Whether this task should be gated right now.
    pub fn gates(&self, task_name: &str) -> bool {
        self.maintenance_mode && !self.exempt_tasks.contains(task_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_off_by_default() {
        let policy = MaintenancePolicy::default();
        assert!(!policy.gates("sync.upsert_contact"));
    }

    #[test]
    fn test_exemptions() {
        let policy = MaintenancePolicy {
            maintenance_mode: true,
            read_only_mode: false,
            exempt_tasks: ["sync.add_sms_contact".to_string()].into(),
        };
        assert!(policy.gates("sync.upsert_contact"));
        assert!(!policy.gates("sync.add_sms_contact"));
    }
}
