//! JSON input files: host snapshots and task submissions.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use taskgrid_core::{HostState, JobKey, Priority};
use taskgrid_scheduler::{HostFeed, SpawnQueueManager};

/// One entry of a tasks file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskSubmission {
    pub job: String,
    pub task: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub at_head: bool,
    /// Unix millis; defaults to zero when the submitter does not track it.
    #[serde(default)]
    pub submit_time: u64,
}

pub fn read_hosts(path: &Path) -> anyhow::Result<Vec<HostState>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading hosts file {}", path.display()))?;
    let hosts = serde_json::from_str(&content)
        .with_context(|| format!("parsing hosts file {}", path.display()))?;
    Ok(hosts)
}

pub fn read_tasks(path: &Path) -> anyhow::Result<Vec<TaskSubmission>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading tasks file {}", path.display()))?;
    let tasks = serde_json::from_str(&content)
        .with_context(|| format!("parsing tasks file {}", path.display()))?;
    Ok(tasks)
}

/// Submit every task in file order. Returns how many were accepted.
pub fn submit_all(manager: &SpawnQueueManager, tasks: Vec<TaskSubmission>) -> usize {
    tasks
        .into_iter()
        .filter(|t| {
            manager.submit_task(t.priority, JobKey::new(t.job.clone(), t.task), t.submit_time, t.at_head)
        })
        .count()
}

/// Host feed backed by a JSON file that is re-read on every tick.
pub struct FileHostFeed {
    path: PathBuf,
}

impl FileHostFeed {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl HostFeed for FileHostFeed {
    fn latest(&mut self) -> anyhow::Result<Vec<HostState>> {
        let hosts = read_hosts(&self.path)?;
        debug!(path = %self.path.display(), hosts = hosts.len(), "host snapshot read");
        Ok(hosts)
    }
}
