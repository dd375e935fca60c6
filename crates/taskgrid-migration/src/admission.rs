//! Migration admission controller.
//!
//! Holds the per-host cooldown stamps (Gate B) and combines them with the
//! size/age throttle (Gate A) into a single go/no-go decision.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use taskgrid_core::{Clock, HostId, TaskDescriptor};

use crate::limits::MigrationLimits;

/// Outcome of evaluating one prospective migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationVerdict {
    Admitted,
    /// Task data is larger than its age currently allows.
    TooLarge { byte_count: u64, allowed: u64 },
    /// One endpoint took part in a migration within the cooldown window.
    HostCoolingDown(HostId),
    /// Destination is the host the task already lives on.
    SameHost,
}

impl MigrationVerdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, MigrationVerdict::Admitted)
    }
}

/// Decides whether tasks may migrate between hosts.
pub struct MigrationAdmission {
    limits: MigrationLimits,
    clock: Arc<dyn Clock>,
    /// Host → time of the last committed migration it took part in.
    /// Entries are never removed; old stamps simply stop mattering.
    last_migration: Mutex<HashMap<HostId, Instant>>,
}

impl MigrationAdmission {
    pub fn new(limits: MigrationLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            clock,
            last_migration: Mutex::new(HashMap::new()),
        }
    }

    pub fn limits(&self) -> &MigrationLimits {
        &self.limits
    }

    /// Gate A.
    pub fn is_size_age_eligible(&self, byte_count: u64, age: Duration) -> bool {
        self.limits.is_size_age_eligible(byte_count, age)
    }

    /// Gate B: neither host has been a migration endpoint recently.
    pub fn is_host_pair_eligible(&self, source: &str, dest: &str) -> bool {
        self.cooling_host(source, dest).is_none()
    }

    /// Evaluate both gates for moving `task` to `dest`. Does not mutate state.
    pub fn evaluate(&self, task: &TaskDescriptor, dest: &str) -> MigrationVerdict {
        if task.host == dest {
            return MigrationVerdict::SameHost;
        }

        let age = self.clock.now().saturating_duration_since(task.queued_at);
        if !self.limits.is_size_age_eligible(task.byte_count, age) {
            return MigrationVerdict::TooLarge {
                byte_count: task.byte_count,
                allowed: self.limits.allowed_bytes(age),
            };
        }

        match self.cooling_host(&task.host, dest) {
            Some(host) => MigrationVerdict::HostCoolingDown(host),
            None => MigrationVerdict::Admitted,
        }
    }

    /// Composite go/no-go for moving `task` to `dest`.
    pub fn admit_migration(&self, task: &TaskDescriptor, dest: &str) -> bool {
        let verdict = self.evaluate(task, dest);
        if !verdict.is_admitted() {
            debug!(
                job = %task.key.job,
                task = task.key.task,
                source = %task.host,
                dest,
                ?verdict,
                "migration rejected"
            );
        }
        verdict.is_admitted()
    }

    /// Stamp both endpoints of a migration that is actually happening.
    pub fn record_migration(&self, source: &str, dest: &str) {
        let now = self.clock.now();
        {
            let mut stamps = self.stamps();
            stamps.insert(source.to_string(), now);
            stamps.insert(dest.to_string(), now);
        }
        info!(
            source,
            dest,
            cooldown_secs = self.limits.host_cooldown.as_secs(),
            "migration recorded"
        );
    }

    /// When `host` last took part in a migration, if ever.
    pub fn last_migration(&self, host: &str) -> Option<Instant> {
        self.stamps().get(host).copied()
    }

    /// First of the two hosts still inside its cooldown window.
    fn cooling_host(&self, source: &str, dest: &str) -> Option<HostId> {
        let now = self.clock.now();
        let stamps = self.stamps();
        [source, dest]
            .into_iter()
            .find(|host| {
                stamps.get(*host).is_some_and(|stamp| {
                    now.saturating_duration_since(*stamp) < self.limits.host_cooldown
                })
            })
            .map(str::to_string)
    }

    fn stamps(&self) -> std::sync::MutexGuard<'_, HashMap<HostId, Instant>> {
        self.last_migration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
