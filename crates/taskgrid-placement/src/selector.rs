//! Candidate ranking for task placement.
//!
//! Hosts are ordered by:
//! 1. tracked free slots, most first (one placement should land where the
//!    most future work still fits)
//! 2. mean active tasks, least first

use std::cmp::Ordering;

use taskgrid_core::{HostId, HostState};

use crate::availability::HostAvailability;

/// Ranking inputs for one candidate host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostScore {
    pub host_id: HostId,
    /// Slots according to the local table (zero when the host is untracked).
    pub slots: u32,
    pub mean_active_tasks: f64,
    /// Index of the candidate in the caller's list.
    pub candidate: usize,
}

impl HostScore {
    fn cmp_rank(&self, other: &Self) -> Ordering {
        other
            .slots
            .cmp(&self.slots)
            .then_with(|| load_key(self.mean_active_tasks).total_cmp(&load_key(other.mean_active_tasks)))
    }
}

/// NaN load readings rank behind every real value.
fn load_key(mean_active_tasks: f64) -> f64 {
    if mean_active_tasks.is_nan() {
        f64::INFINITY
    } else {
        mean_active_tasks
    }
}

/// Score all candidates and return them best first.
///
/// With `require_available_slot`, candidates whose tracked slot count is
/// zero are dropped. Equal candidates keep their input order.
pub fn rank_hosts(
    table: &HostAvailability,
    candidates: &[HostState],
    require_available_slot: bool,
) -> Vec<HostScore> {
    let mut scores: Vec<HostScore> = candidates
        .iter()
        .enumerate()
        .filter_map(|(candidate, host)| {
            let record = table.get(&host.host_id);
            let slots = record.map_or(0, |r| r.available_slots);
            if require_available_slot && slots == 0 {
                return None;
            }
            Some(HostScore {
                host_id: host.host_id.clone(),
                slots,
                mean_active_tasks: record.map_or(host.mean_active_tasks, |r| r.mean_active_tasks),
                candidate,
            })
        })
        .collect();

    scores.sort_by(HostScore::cmp_rank);
    scores
}

/// Pick the best candidate, or `None` when nothing qualifies.
pub fn select_best_host(
    table: &HostAvailability,
    candidates: &[HostState],
    require_available_slot: bool,
) -> Option<HostState> {
    rank_hosts(table, candidates, require_available_slot)
        .first()
        .map(|best| candidates[best.candidate].clone())
}
