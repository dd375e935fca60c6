//! Error types for the task queue store.

use taskgrid_core::{JobKey, Priority};
use thiserror::Error;

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("task {key} is not queued at priority {priority}")]
    NotFound { priority: Priority, key: JobKey },
}
