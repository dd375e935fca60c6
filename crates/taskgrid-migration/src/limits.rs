//! Gate A: the size/age throttle.

use std::time::Duration;

use taskgrid_core::{ConfigResult, MigrationConfig};

const DEFAULT_MAX_BYTES: u64 = 50_000_000_000;
const DEFAULT_LIMIT_GROWTH_INTERVAL: Duration = Duration::from_secs(20 * 60);
const DEFAULT_HOST_COOLDOWN: Duration = Duration::from_secs(4 * 60);

/// Tasks at or below this size pass the size/age throttle at any age,
/// capped at `max_bytes`.
pub const NEGLIGIBLE_BYTES: u64 = 1 << 20;

/// Tunables for migration admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationLimits {
    /// Largest task ever eligible to migrate.
    pub max_bytes: u64,
    /// Age at which a task reaches full eligibility.
    pub limit_growth_interval: Duration,
    /// How long a migration endpoint sits out afterwards.
    pub host_cooldown: Duration,
}

impl Default for MigrationLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            limit_growth_interval: DEFAULT_LIMIT_GROWTH_INTERVAL,
            host_cooldown: DEFAULT_HOST_COOLDOWN,
        }
    }
}

impl MigrationLimits {
    pub fn from_config(config: &MigrationConfig) -> ConfigResult<Self> {
        Ok(Self {
            max_bytes: config.max_bytes,
            limit_growth_interval: config.limit_growth_interval()?,
            host_cooldown: config.host_cooldown()?,
        })
    }

    pub fn allowed_bytes(&self, age: Duration) -> u64 {
        allowed_bytes(self.max_bytes, self.limit_growth_interval, age)
    }

    pub fn is_size_age_eligible(&self, byte_count: u64, age: Duration) -> bool {
        is_size_age_eligible(self.max_bytes, self.limit_growth_interval, byte_count, age)
    }
}

/// Largest migratable size for a task that has waited `age`.
///
/// Integer arithmetic on nanoseconds; a zero growth interval means the
/// full ceiling applies immediately.
pub fn allowed_bytes(max_bytes: u64, limit_growth_interval: Duration, age: Duration) -> u64 {
    if age >= limit_growth_interval {
        return max_bytes;
    }
    let scaled = u128::from(max_bytes) * age.as_nanos() / limit_growth_interval.as_nanos();
    // age < interval, so scaled < max_bytes
    scaled as u64
}

pub fn is_size_age_eligible(
    max_bytes: u64,
    limit_growth_interval: Duration,
    byte_count: u64,
    age: Duration,
) -> bool {
    if byte_count <= NEGLIGIBLE_BYTES.min(max_bytes) {
        return true;
    }
    byte_count <= allowed_bytes(max_bytes, limit_growth_interval, age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> MigrationLimits {
        MigrationLimits::default()
    }

    #[test]
    fn empty_task_migrates_immediately() {
        assert!(limits().is_size_age_eligible(0, Duration::ZERO));
    }

    #[test]
    fn negligible_task_migrates_immediately() {
        let l = limits();
        assert!(l.is_size_age_eligible(1, Duration::ZERO));
        assert!(l.is_size_age_eligible(NEGLIGIBLE_BYTES, Duration::ZERO));
        assert!(!l.is_size_age_eligible(NEGLIGIBLE_BYTES + 1, Duration::ZERO));
    }

    #[test]
    fn negligible_floor_never_exceeds_max_bytes() {
        assert!(is_size_age_eligible(10, Duration::from_secs(60), 10, Duration::ZERO));
        assert!(!is_size_age_eligible(10, Duration::from_secs(60), 11, Duration::from_secs(3600)));
    }

    #[test]
    fn oversized_task_never_migrates() {
        let l = limits();
        assert!(!l.is_size_age_eligible(2 * l.max_bytes, 2 * l.limit_growth_interval));
        assert!(!l.is_size_age_eligible(l.max_bytes + 1, Duration::from_secs(86_400 * 365)));
    }

    #[test]
    fn medium_task_waits() {
        let l = limits();
        assert!(!l.is_size_age_eligible(l.max_bytes / 2, Duration::ZERO));
        assert!(l.is_size_age_eligible(l.max_bytes / 2, l.limit_growth_interval));
    }

    #[test]
    fn medium_task_eligible_at_half_interval() {
        let l = limits();
        let half = l.limit_growth_interval / 2;
        assert!(l.is_size_age_eligible(l.max_bytes / 2, half));
        assert!(!l.is_size_age_eligible(l.max_bytes / 2, half - Duration::from_secs(1)));
    }

    #[test]
    fn ceiling_grows_linearly_then_caps() {
        let l = MigrationLimits {
            max_bytes: 1_000,
            limit_growth_interval: Duration::from_secs(100),
            host_cooldown: Duration::ZERO,
        };
        assert_eq!(l.allowed_bytes(Duration::ZERO), 0);
        assert_eq!(l.allowed_bytes(Duration::from_secs(25)), 250);
        assert_eq!(l.allowed_bytes(Duration::from_secs(100)), 1_000);
        assert_eq!(l.allowed_bytes(Duration::from_secs(1_000)), 1_000);
    }

    #[test]
    fn zero_growth_interval_is_full_eligibility() {
        assert_eq!(allowed_bytes(500, Duration::ZERO, Duration::ZERO), 500);
        assert!(is_size_age_eligible(500, Duration::ZERO, 500, Duration::ZERO));
    }

    #[test]
    fn from_config_parses_durations() {
        let config = MigrationConfig {
            max_bytes: 10,
            limit_growth_interval: "1h".to_string(),
            host_cooldown: "30s".to_string(),
        };
        let l = MigrationLimits::from_config(&config).unwrap();
        assert_eq!(l.max_bytes, 10);
        assert_eq!(l.limit_growth_interval, Duration::from_secs(3600));
        assert_eq!(l.host_cooldown, Duration::from_secs(30));
    }

    #[test]
    fn config_defaults_match_limit_defaults() {
        let l = MigrationLimits::from_config(&MigrationConfig::default()).unwrap();
        assert_eq!(l, MigrationLimits::default());
    }
}
