//! taskgrid-core: shared types for the TaskGrid dispatch engine.
//!
//! Every other crate in the workspace speaks in terms of these types:
//! [`JobKey`] identifies a queued task, [`HostState`] is the snapshot
//! the membership layer reports per worker host, and [`TaskDescriptor`]
//! describes a placed task that may be considered for migration.
//!
//! Time is always read through a [`Clock`] so that queue ages and
//! migration cooldowns can be driven deterministically in tests.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatchConfig, MigrationConfig, TaskgridConfig, parse_duration};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
