//! taskgrid-placement: picks the host a task runs on.
//!
//! This crate owns the per-host slot table and the ranking used to
//! choose among candidate hosts. It does NOT own the queue or the lock
//! that makes select-then-decrement atomic (that's `taskgrid-scheduler`).
//!
//! # Components
//!
//! - **`availability`**: slot table rebuilt from each host snapshot,
//!   decremented locally between snapshots
//! - **`selector`**: candidate ranking (most free slots, then least load)

pub mod availability;
pub mod selector;

pub use availability::{HostAvailability, HostRecord};
pub use selector::{HostScore, rank_hosts, select_best_host};
