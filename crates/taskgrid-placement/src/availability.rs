//! Per-host slot accounting.
//!
//! The authoritative slot count for a host comes from the most recent
//! membership snapshot. Between snapshots the scheduler decrements the
//! local copy once per committed placement so that two placements cannot
//! claim the same slot before the cluster reports it as used. Nothing
//! here ever adds slots back; only the next snapshot does.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use taskgrid_core::{HostId, HostState};

use crate::selector::select_best_host;

/// Mutable counters derived from one host's snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub host_id: HostId,
    pub available_slots: u32,
    pub mean_active_tasks: f64,
}

impl From<&HostState> for HostRecord {
    fn from(host: &HostState) -> Self {
        Self {
            host_id: host.host_id.clone(),
            available_slots: host.available_slots,
            mean_active_tasks: host.mean_active_tasks,
        }
    }
}

impl From<&HostRecord> for HostState {
    fn from(record: &HostRecord) -> Self {
        HostState::new(
            record.host_id.clone(),
            record.available_slots,
            record.mean_active_tasks,
        )
    }
}

/// The slot table: host id → record.
#[derive(Debug, Clone, Default)]
pub struct HostAvailability {
    hosts: HashMap<HostId, HostRecord>,
}

impl HostAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a snapshot.
    ///
    /// If a host appears more than once the last report wins.
    pub fn from_snapshot(snapshot: &[HostState]) -> Self {
        let hosts = snapshot
            .iter()
            .map(|host| (host.host_id.clone(), HostRecord::from(host)))
            .collect();
        Self { hosts }
    }

    /// Replace the whole table with a fresh snapshot.
    ///
    /// The new table is built off to the side and swapped in, so any
    /// reader holding the same lock sees either the old or the new table.
    pub fn replace(&mut self, snapshot: &[HostState]) {
        let fresh = Self::from_snapshot(snapshot);
        let previous = std::mem::replace(self, fresh);
        info!(
            hosts = self.hosts.len(),
            previous_hosts = previous.hosts.len(),
            total_slots = self.total_slots(),
            "host availability replaced"
        );
    }

    pub fn get(&self, host_id: &str) -> Option<&HostRecord> {
        self.hosts.get(host_id)
    }

    pub fn available_slots(&self, host_id: &str) -> Option<u32> {
        self.hosts.get(host_id).map(|r| r.available_slots)
    }

    pub fn total_slots(&self) -> u64 {
        self.hosts.values().map(|r| u64::from(r.available_slots)).sum()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Current table as host states, sorted by host id.
    pub fn tracked_hosts(&self) -> Vec<HostState> {
        let mut hosts: Vec<HostState> = self.hosts.values().map(HostState::from).collect();
        hosts.sort_by(|a, b| a.host_id.cmp(&b.host_id));
        hosts
    }

    /// Consume one slot on `host_id`, clamped at zero.
    ///
    /// Returns the remaining count, or `None` for an untracked host.
    pub fn mark_task_active(&mut self, host_id: &str) -> Option<u32> {
        let Some(record) = self.hosts.get_mut(host_id) else {
            warn!(host = host_id, "task marked active on untracked host");
            return None;
        };
        record.available_slots = record.available_slots.saturating_sub(1);
        debug!(
            host = host_id,
            remaining = record.available_slots,
            "host slot consumed"
        );
        Some(record.available_slots)
    }

    /// Select the best candidate and consume one of its slots.
    ///
    /// Callers must hold exclusive access to the table for the duration
    /// of this call; the `&mut self` receiver is what makes the pair atomic.
    pub fn reserve_best_host(
        &mut self,
        candidates: &[HostState],
        require_available_slot: bool,
    ) -> Option<HostState> {
        let chosen = select_best_host(self, candidates, require_available_slot)?;
        self.mark_task_active(&chosen.host_id);
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Vec<HostState> {
        vec![
            HostState::new("h1", 0, 0.0),
            HostState::new("h2", 1, 0.95),
            HostState::new("h3", 1, 0.03),
            HostState::new("h4", 2, 0.99),
        ]
    }

    #[test]
    fn snapshot_values_are_taken_verbatim() {
        let table = HostAvailability::from_snapshot(&snapshot());
        assert_eq!(table.len(), 4);
        assert_eq!(table.available_slots("h4"), Some(2));
        assert_eq!(table.available_slots("h1"), Some(0));
        assert_eq!(table.available_slots("nope"), None);
        assert_eq!(table.total_slots(), 4);
    }

    #[test]
    fn replace_overwrites_instead_of_adding() {
        let mut table = HostAvailability::from_snapshot(&snapshot());
        table.replace(&[HostState::new("h4", 3, 0.5)]);

        assert_eq!(table.len(), 1);
        assert_eq!(table.available_slots("h4"), Some(3));
        assert_eq!(table.available_slots("h2"), None);
    }

    #[test]
    fn replace_restores_decremented_slots() {
        let mut table = HostAvailability::from_snapshot(&snapshot());
        table.mark_task_active("h4");
        table.mark_task_active("h4");
        assert_eq!(table.available_slots("h4"), Some(0));

        table.replace(&snapshot());
        assert_eq!(table.available_slots("h4"), Some(2));
    }

    #[test]
    fn mark_active_clamps_at_zero() {
        let mut table = HostAvailability::from_snapshot(&snapshot());
        assert_eq!(table.mark_task_active("h1"), Some(0));
        assert_eq!(table.mark_task_active("h1"), Some(0));
    }

    #[test]
    fn mark_active_on_untracked_host_is_noop() {
        let mut table = HostAvailability::from_snapshot(&snapshot());
        assert_eq!(table.mark_task_active("ghost"), None);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn later_duplicate_in_snapshot_wins() {
        let table = HostAvailability::from_snapshot(&[
            HostState::new("h", 1, 0.0),
            HostState::new("h", 6, 0.0),
        ]);
        assert_eq!(table.available_slots("h"), Some(6));
    }

    #[test]
    fn reserve_after_kick_moves_to_least_loaded_single_slot_host() {
        let all = snapshot();
        let mut table = HostAvailability::from_snapshot(&all);

        assert_eq!(table.reserve_best_host(&all, true).unwrap().host_id, "h4");
        assert_eq!(table.available_slots("h4"), Some(1));

        // h2, h3 and h4 now all have one slot; h3 carries the least load.
        assert_eq!(table.reserve_best_host(&all, true).unwrap().host_id, "h3");
        assert_eq!(table.available_slots("h3"), Some(0));
    }

    #[test]
    fn repeated_identical_snapshots_keep_selection_stable() {
        let all = snapshot();
        let mut table = HostAvailability::new();
        table.replace(&all);
        let first = select_best_host(&table, &all, true);
        table.replace(&all);
        table.replace(&all);
        assert_eq!(select_best_host(&table, &all, true), first);
    }

    #[test]
    fn tracked_hosts_sorted_by_id() {
        let table = HostAvailability::from_snapshot(&snapshot());
        let ids: Vec<String> = table.tracked_hosts().into_iter().map(|h| h.host_id).collect();
        assert_eq!(ids, vec!["h1", "h2", "h3", "h4"]);
    }

    #[test]
    fn record_serializes() {
        let record = HostRecord::from(&HostState::new("h9", 4, 1.5));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"host_id":"h9","available_slots":4,"mean_active_tasks":1.5}"#);
    }
}
