//! Scheduler error types.

use thiserror::Error;

/// Errors surfaced by the spawn queue manager.
///
/// Empty results (no host available, migration refused, unknown
/// priority) are normal outcomes and are not represented here.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("queue error: {0}")]
    Queue(#[from] taskgrid_queue::QueueError),

    #[error("config error: {0}")]
    Config(#[from] taskgrid_core::ConfigError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
