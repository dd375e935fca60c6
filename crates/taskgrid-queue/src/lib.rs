//! taskgrid-queue: the pending-task store.
//!
//! Tasks waiting for a slot are grouped into priority partitions. Each
//! partition keeps submission order, except that a task enqueued "at
//! head" jumps in front of everything already waiting at its priority.
//!
//! # Ordering
//!
//! ```text
//! partitions: BTreeMap<Priority, VecDeque<QueueItem>>   (ascending keys)
//! iteration:  highest priority first, items front-to-back
//! ```
//!
//! The store is a plain data structure; the scheduler wraps it in a lock.

pub mod error;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use store::{PartitionSnapshot, QueueItem, TaskQueueStore};
