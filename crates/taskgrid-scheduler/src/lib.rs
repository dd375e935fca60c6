//! taskgrid-scheduler: the dispatch decision engine.
//!
//! `SpawnQueueManager` composes the queue store, the host slot table and
//! the migration admission controller behind one API. The cluster's
//! dispatch loop calls it to learn which task runs next and where, and
//! whether a running task may be relocated.
//!
//! # Architecture
//!
//! ```text
//! SpawnQueueManager
//!   ├── Mutex<TaskQueueStore>      (priority partitions)
//!   ├── Mutex<HostAvailability>    (slot table, swapped per snapshot)
//!   ├── MigrationAdmission         (size/age gate + host cooldowns)
//!   └── SchedulerStats             (atomic counters)
//!
//! DispatchLoop
//!   └── every interval: HostFeed → update_availability → run_dispatch_cycle → mpsc
//! ```
//!
//! Locks are always taken queue first, then hosts.

pub mod dispatch;
pub mod error;
pub mod manager;
pub mod stats;

pub use dispatch::{DispatchLoop, DispatchSettings, HostFeed, Placement};
pub use error::{SchedulerError, SchedulerResult};
pub use manager::SpawnQueueManager;
pub use stats::{SchedulerStats, StatsSnapshot, render_prometheus};
