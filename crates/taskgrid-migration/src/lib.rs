//! taskgrid-migration: decides whether a task may move hosts right now.
//!
//! Two gates must both pass:
//!
//! # Gate A: size/age throttle
//!
//! ```text
//! allowed(age) = max_bytes * min(1, age / limit_growth_interval)
//! admit        = byte_count <= max(allowed(age), min(NEGLIGIBLE_BYTES, max_bytes))
//! ```
//!
//! Tasks up to [`NEGLIGIBLE_BYTES`] pass at any age; tasks above
//! `max_bytes` never pass.
//!
//! # Gate B: host cooldown
//!
//! Both endpoints of a committed migration are stamped with the current
//! time. A stamped host may not take part in another migration, in either
//! role, until `host_cooldown` has elapsed.
//!
//! Checking and committing are separate calls. Two callers can both pass
//! Gate B before either commits; the cooldown dampens migration bursts
//! but does not serialize them.

pub mod admission;
pub mod limits;

pub use admission::{MigrationAdmission, MigrationVerdict};
pub use limits::{MigrationLimits, NEGLIGIBLE_BYTES, allowed_bytes, is_size_age_eligible};
