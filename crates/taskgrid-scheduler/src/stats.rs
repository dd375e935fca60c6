//! Scheduler counters and their Prometheus text exposition.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic counters updated by the manager. Lock-free.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    tasks_submitted: AtomicU64,
    duplicate_submissions: AtomicU64,
    tasks_dispatched: AtomicU64,
    tasks_withdrawn: AtomicU64,
    snapshots_applied: AtomicU64,
    dispatch_cycles: AtomicU64,
    migrations_admitted: AtomicU64,
    migrations_rejected: AtomicU64,
    migrations_recorded: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub tasks_submitted: u64,
    pub duplicate_submissions: u64,
    pub tasks_dispatched: u64,
    pub tasks_withdrawn: u64,
    pub snapshots_applied: u64,
    pub dispatch_cycles: u64,
    pub migrations_admitted: u64,
    pub migrations_rejected: u64,
    pub migrations_recorded: u64,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self, n: u64) {
                self.$field.fetch_add(n, Ordering::Relaxed);
            }
        )*
    };
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    bump! {
        add_submitted => tasks_submitted,
        add_duplicates => duplicate_submissions,
        add_dispatched => tasks_dispatched,
        add_withdrawn => tasks_withdrawn,
        add_snapshots => snapshots_applied,
        add_cycles => dispatch_cycles,
        add_migrations_admitted => migrations_admitted,
        add_migrations_rejected => migrations_rejected,
        add_migrations_recorded => migrations_recorded,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            duplicate_submissions: self.duplicate_submissions.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_withdrawn: self.tasks_withdrawn.load(Ordering::Relaxed),
            snapshots_applied: self.snapshots_applied.load(Ordering::Relaxed),
            dispatch_cycles: self.dispatch_cycles.load(Ordering::Relaxed),
            migrations_admitted: self.migrations_admitted.load(Ordering::Relaxed),
            migrations_rejected: self.migrations_rejected.load(Ordering::Relaxed),
            migrations_recorded: self.migrations_recorded.load(Ordering::Relaxed),
        }
    }
}

/// Render counters plus current queue/slot gauges in Prometheus text format.
pub fn render_prometheus(stats: &StatsSnapshot, queued_tasks: usize, free_slots: u64) -> String {
    let counters: [(&str, &str, u64); 9] = [
        ("tasks_submitted_total", "Tasks accepted into the queue.", stats.tasks_submitted),
        ("duplicate_submissions_total", "Submissions ignored because the task was already queued.", stats.duplicate_submissions),
        ("tasks_dispatched_total", "Tasks removed from the queue after placement.", stats.tasks_dispatched),
        ("tasks_withdrawn_total", "Queue entries removed by withdrawal.", stats.tasks_withdrawn),
        ("host_snapshots_total", "Host availability snapshots applied.", stats.snapshots_applied),
        ("dispatch_cycles_total", "Dispatch cycles run.", stats.dispatch_cycles),
        ("migrations_admitted_total", "Migration checks that passed both gates.", stats.migrations_admitted),
        ("migrations_rejected_total", "Migration checks that failed a gate.", stats.migrations_rejected),
        ("migrations_recorded_total", "Migrations committed.", stats.migrations_recorded),
    ];

    let mut out = String::new();
    for (name, help, value) in counters {
        out.push_str(&format!("# HELP taskgrid_{name} {help}\n"));
        out.push_str(&format!("# TYPE taskgrid_{name} counter\n"));
        out.push_str(&format!("taskgrid_{name} {value}\n"));
    }

    out.push_str("# HELP taskgrid_queued_tasks Tasks currently waiting in the queue.\n");
    out.push_str("# TYPE taskgrid_queued_tasks gauge\n");
    out.push_str(&format!("taskgrid_queued_tasks {queued_tasks}\n"));

    out.push_str("# HELP taskgrid_free_slots Free slots in the local host table.\n");
    out.push_str("# TYPE taskgrid_free_slots gauge\n");
    out.push_str(&format!("taskgrid_free_slots {free_slots}\n"));

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = SchedulerStats::new();
        stats.add_submitted(3);
        stats.add_dispatched(2);
        stats.add_migrations_rejected(1);

        let snap = stats.snapshot();
        assert_eq!(snap.tasks_submitted, 3);
        assert_eq!(snap.tasks_dispatched, 2);
        assert_eq!(snap.migrations_rejected, 1);
        assert_eq!(snap.migrations_admitted, 0);
    }

    #[test]
    fn render_empty() {
        let output = render_prometheus(&StatsSnapshot::default(), 0, 0);
        assert!(output.contains("# TYPE taskgrid_tasks_submitted_total counter"));
        assert!(output.contains("taskgrid_queued_tasks 0\n"));
    }

    #[test]
    fn render_values() {
        let snap = StatsSnapshot {
            tasks_dispatched: 12,
            migrations_recorded: 4,
            ..StatsSnapshot::default()
        };
        let output = render_prometheus(&snap, 7, 30);

        assert!(output.contains("taskgrid_tasks_dispatched_total 12\n"));
        assert!(output.contains("taskgrid_migrations_recorded_total 4\n"));
        assert!(output.contains("taskgrid_queued_tasks 7\n"));
        assert!(output.contains("taskgrid_free_slots 30\n"));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let output = render_prometheus(&StatsSnapshot::default(), 1, 2);
        for line in output.lines() {
            if line.starts_with('#') {
                continue;
            }
            let mut parts = line.split(' ');
            let name = parts.next().unwrap();
            let value = parts.next().unwrap();
            assert!(name.starts_with("taskgrid_"), "bad metric name: {line}");
            assert!(value.parse::<u64>().is_ok(), "bad value: {line}");
            assert!(parts.next().is_none());
        }
    }
}
