//! Spawn queue manager: the scheduling decision API.
//!
//! The manager owns all mutable scheduling state:
//! - pending tasks, grouped by priority
//! - the per-host slot table, replaced on every membership snapshot
//! - migration cooldown stamps
//!
//! Each piece sits behind its own lock. Whenever both the queue and the
//! slot table are needed the queue lock is taken first.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use taskgrid_core::{Clock, HostState, JobKey, Priority, TaskDescriptor, TaskgridConfig};
use taskgrid_migration::{MigrationAdmission, MigrationLimits};
use taskgrid_placement::HostAvailability;
use taskgrid_queue::{PartitionSnapshot, QueueItem, TaskQueueStore};

use crate::dispatch::{DispatchSettings, Placement};
use crate::error::SchedulerResult;
use crate::stats::{SchedulerStats, StatsSnapshot, render_prometheus};

pub struct SpawnQueueManager {
    queue: Mutex<TaskQueueStore>,
    hosts: Mutex<HostAvailability>,
    migration: MigrationAdmission,
    clock: Arc<dyn Clock>,
    stats: SchedulerStats,
}

impl SpawnQueueManager {
    pub fn new(limits: MigrationLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: Mutex::new(TaskQueueStore::new()),
            hosts: Mutex::new(HostAvailability::new()),
            migration: MigrationAdmission::new(limits, clock.clone()),
            clock,
            stats: SchedulerStats::new(),
        }
    }

    /// Build a manager from the `[migration]` section of a config file.
    pub fn from_config(config: &TaskgridConfig, clock: Arc<dyn Clock>) -> SchedulerResult<Self> {
        let limits = MigrationLimits::from_config(&config.migration)?;
        Ok(Self::new(limits, clock))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ── Queue ───────────────────────────────────────────────────────

    /// Queue a task. Returns `false` if the key already waits at `priority`.
    pub fn submit_task(&self, priority: Priority, key: JobKey, submit_time: u64, at_head: bool) -> bool {
        let item = QueueItem::new(key, priority, submit_time, self.clock.now());
        let inserted = self.queue().enqueue(item, at_head);
        if inserted {
            self.stats.add_submitted(1);
        } else {
            self.stats.add_duplicates(1);
        }
        inserted
    }

    pub fn queued_count(&self, priority: Priority) -> usize {
        self.queue().count_queued(priority)
    }

    pub fn total_queued(&self) -> usize {
        self.queue().total_queued()
    }

    /// Every queued task, highest priority first, head-of-line items first
    /// within a priority. The queue is copied out under the lock.
    pub fn next_dispatch_candidates(&self) -> Vec<QueueItem> {
        self.queue().items().cloned().collect()
    }

    /// Serializable view of the queue in dispatch order.
    pub fn queue_snapshot(&self) -> Vec<PartitionSnapshot> {
        self.queue().snapshot()
    }

    /// Remove a task the caller has dispatched.
    ///
    /// A missing entry means the caller's view and the queue disagree
    /// (for example the same task dispatched twice) and is returned as an
    /// error.
    pub fn complete_dispatch(&self, priority: Priority, key: &JobKey) -> SchedulerResult<QueueItem> {
        let item = self.queue().dequeue(priority, key).inspect_err(|e| {
            warn!(error = %e, "dequeue of task that is not queued");
        })?;
        self.stats.add_dispatched(1);
        Ok(item)
    }

    /// Drop a task from every priority it is queued at.
    pub fn withdraw_task(&self, key: &JobKey) -> usize {
        let removed = self.queue().withdraw(key);
        self.stats.add_withdrawn(removed as u64);
        removed
    }

    // ── Hosts ───────────────────────────────────────────────────────

    /// Replace the slot table with a fresh membership snapshot.
    pub fn update_availability(&self, snapshot: &[HostState]) {
        self.hosts().replace(snapshot);
        self.stats.add_snapshots(1);
    }

    /// Best host among `candidates`, without consuming a slot.
    ///
    /// Callers that go on to place a task must follow up with
    /// [`mark_task_active`](Self::mark_task_active), or use
    /// [`reserve_host`](Self::reserve_host) to do both under one lock.
    pub fn choose_host(&self, candidates: &[HostState], require_slot: bool) -> Option<HostState> {
        let hosts = self.hosts();
        taskgrid_placement::select_best_host(&hosts, candidates, require_slot)
    }

    /// Consume one slot on `host_id`. Returns the remaining count.
    pub fn mark_task_active(&self, host_id: &str) -> Option<u32> {
        self.hosts().mark_task_active(host_id)
    }

    /// Choose the best host and consume one of its slots atomically.
    pub fn reserve_host(&self, candidates: &[HostState], require_slot: bool) -> Option<HostState> {
        self.hosts().reserve_best_host(candidates, require_slot)
    }

    pub fn available_slots(&self, host_id: &str) -> Option<u32> {
        self.hosts().available_slots(host_id)
    }

    pub fn tracked_hosts(&self) -> Vec<HostState> {
        self.hosts().tracked_hosts()
    }

    // ── Migration ───────────────────────────────────────────────────

    pub fn migration(&self) -> &MigrationAdmission {
        &self.migration
    }

    /// May `task` move to `dest` right now? Does not stamp any host.
    pub fn consider_migration(&self, task: &TaskDescriptor, dest: &str) -> bool {
        let admitted = self.migration.admit_migration(task, dest);
        if admitted {
            self.stats.add_migrations_admitted(1);
        } else {
            self.stats.add_migrations_rejected(1);
        }
        admitted
    }

    /// Commit a migration the caller has started.
    pub fn record_migration(&self, source: &str, dest: &str) {
        self.migration.record_migration(source, dest);
        self.stats.add_migrations_recorded(1);
    }

    // ── Dispatch ────────────────────────────────────────────────────

    /// Place as many queued tasks as the slot table allows.
    ///
    /// Walks the queue in dispatch order and gives each task the best
    /// tracked host, consuming a slot and removing the task as it goes.
    /// Stops at the first task no host can take (every task sees the same
    /// candidate set, so later tasks would not fit either) or once
    /// `max_per_cycle` placements were made.
    pub fn run_dispatch_cycle(&self, settings: &DispatchSettings) -> Vec<Placement> {
        let mut queue = self.queue();
        let mut hosts = self.hosts();
        let now = self.clock.now();

        let candidates = hosts.tracked_hosts();
        let pending: Vec<(Priority, JobKey)> = queue
            .items()
            .map(|item| (item.priority, item.key.clone()))
            .collect();

        let mut placements = Vec::new();
        for (priority, key) in pending {
            if settings.max_per_cycle != 0 && placements.len() >= settings.max_per_cycle {
                break;
            }
            let Some(host) = hosts.reserve_best_host(&candidates, settings.require_available_slot)
            else {
                debug!(
                    job = %key.job,
                    task = key.task,
                    priority,
                    "no host with a free slot, ending cycle"
                );
                break;
            };

            match queue.dequeue(priority, &key) {
                Ok(item) => {
                    let placement = Placement {
                        key: item.key,
                        priority,
                        host: host.host_id,
                        waited: now.saturating_duration_since(item.enqueued_at),
                    };
                    debug!(
                        job = %placement.key.job,
                        task = placement.key.task,
                        priority,
                        host = %placement.host,
                        "task placed"
                    );
                    placements.push(placement);
                }
                // Unreachable while both locks are held.
                Err(e) => warn!(error = %e, "queued task vanished during dispatch"),
            }
        }

        drop(hosts);
        drop(queue);

        self.stats.add_cycles(1);
        self.stats.add_dispatched(placements.len() as u64);
        info!(
            placed = placements.len(),
            remaining = self.total_queued(),
            "dispatch cycle finished"
        );
        placements
    }

    // ── Introspection ───────────────────────────────────────────────

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Prometheus text exposition of counters and current gauges.
    pub fn render_metrics(&self) -> String {
        let queued = self.total_queued();
        let free_slots = self.hosts().total_slots();
        render_prometheus(&self.stats.snapshot(), queued, free_slots)
    }

    fn queue(&self) -> MutexGuard<'_, TaskQueueStore> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hosts(&self) -> MutexGuard<'_, HostAvailability> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
