//! Domain types shared across TaskGrid crates.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Unique identifier for a worker host in the cluster.
pub type HostId = String;

/// Priority class of a queued task. Higher values are served first.
pub type Priority = i32;

/// Identifies one task of one job. Unique within the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub job: String,
    pub task: u32,
}

impl JobKey {
    pub fn new(job: impl Into<String>, task: u32) -> Self {
        Self {
            job: job.into(),
            task,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job, self.task)
    }
}

/// A host as reported by the cluster membership layer.
///
/// The dispatch engine never mutates a snapshot; it derives its own
/// slot counters from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostState {
    pub host_id: HostId,
    /// Free execution slots at the time of the report.
    pub available_slots: u32,
    /// Smoothed count of recently active tasks (lower = less loaded).
    #[serde(default)]
    pub mean_active_tasks: f64,
}

impl HostState {
    pub fn new(host_id: impl Into<HostId>, available_slots: u32, mean_active_tasks: f64) -> Self {
        Self {
            host_id: host_id.into(),
            available_slots,
            mean_active_tasks,
        }
    }
}

/// A task that currently lives on a host and could be moved elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    pub key: JobKey,
    /// Host currently holding the task's data.
    pub host: HostId,
    /// Size of the task's data in bytes.
    pub byte_count: u64,
    /// When the task became eligible to run (read from the engine's clock).
    pub queued_at: Instant,
}

impl TaskDescriptor {
    pub fn new(key: JobKey, host: impl Into<HostId>, byte_count: u64, queued_at: Instant) -> Self {
        Self {
            key,
            host: host.into(),
            byte_count,
            queued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_key_display() {
        assert_eq!(JobKey::new("nightly-rollup", 7).to_string(), "nightly-rollup/7");
    }

    #[test]
    fn job_keys_order_by_job_then_task() {
        let mut keys = vec![JobKey::new("b", 0), JobKey::new("a", 2), JobKey::new("a", 1)];
        keys.sort();
        assert_eq!(
            keys,
            vec![JobKey::new("a", 1), JobKey::new("a", 2), JobKey::new("b", 0)]
        );
    }

    #[test]
    fn host_state_parses_without_mean_active() {
        let host: HostState =
            serde_json::from_str(r#"{"host_id":"h1","available_slots":3}"#).unwrap();
        assert_eq!(host.host_id, "h1");
        assert_eq!(host.available_slots, 3);
        assert_eq!(host.mean_active_tasks, 0.0);
    }
}
