//! taskgrid.toml configuration parser.
//!
//! Every section and key is optional. A missing file section falls back
//! to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

const DEFAULT_MIGRATION_MAX_BYTES: u64 = 50_000_000_000;
const DEFAULT_LIMIT_GROWTH_INTERVAL: &str = "20m";
const DEFAULT_HOST_COOLDOWN: &str = "4m";
const DEFAULT_DISPATCH_INTERVAL: &str = "5s";
const DEFAULT_MAX_PER_CYCLE: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskgridConfig {
    pub migration: MigrationConfig,
    pub dispatch: DispatchConfig,
}

/// Migration throttling knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Largest task (in bytes) that may ever be migrated.
    pub max_bytes: u64,
    /// Time for the migratable size ceiling to ramp from zero to `max_bytes`.
    pub limit_growth_interval: String,
    /// How long a host sits out after taking part in a migration.
    pub host_cooldown: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MIGRATION_MAX_BYTES,
            limit_growth_interval: DEFAULT_LIMIT_GROWTH_INTERVAL.to_string(),
            host_cooldown: DEFAULT_HOST_COOLDOWN.to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn limit_growth_interval(&self) -> ConfigResult<Duration> {
        parse_duration(&self.limit_growth_interval)
    }

    pub fn host_cooldown(&self) -> ConfigResult<Duration> {
        parse_duration(&self.host_cooldown)
    }
}

/// Dispatch loop knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub interval: String,
    /// Upper bound on placements per cycle. Zero means unbounded.
    pub max_per_cycle: usize,
    pub require_available_slot: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_DISPATCH_INTERVAL.to_string(),
            max_per_cycle: DEFAULT_MAX_PER_CYCLE,
            require_available_slot: true,
        }
    }
}

impl DispatchConfig {
    pub fn interval(&self) -> ConfigResult<Duration> {
        parse_duration(&self.interval)
    }
}

impl TaskgridConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Parse and validate a config document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: TaskgridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check value ranges and that every duration parses.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.migration.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "migration.max_bytes must be greater than zero".to_string(),
            ));
        }
        self.migration.limit_growth_interval()?;
        self.migration.host_cooldown()?;

        let interval = self.dispatch.interval()?;
        if interval.is_zero() {
            return Err(ConfigError::Invalid(
                "dispatch.interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration string like "250ms", "30s", "5m", "1h".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let (digits, unit): (&str, fn(u64) -> Option<Duration>) =
        if let Some(n) = s.strip_suffix("ms") {
            (n, |ms| Some(Duration::from_millis(ms)))
        } else if let Some(n) = s.strip_suffix('s') {
            (n, |secs| Some(Duration::from_secs(secs)))
        } else if let Some(n) = s.strip_suffix('m') {
            (n, |m| m.checked_mul(60).map(Duration::from_secs))
        } else if let Some(n) = s.strip_suffix('h') {
            (n, |h| h.checked_mul(3600).map(Duration::from_secs))
        } else {
            (s, |secs| Some(Duration::from_secs(secs)))
        };

    let value = digits.trim().parse::<u64>().map_err(|_| invalid())?;
    unit(value).ok_or_else(invalid)
}
