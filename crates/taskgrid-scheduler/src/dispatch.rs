//! Dispatch loop: periodically turns queued tasks into placements.
//!
//! Each tick pulls the latest host snapshot from a [`HostFeed`], swaps it
//! into the manager, runs one dispatch cycle and forwards the resulting
//! placements to the executor over an mpsc channel.

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use taskgrid_core::{ConfigResult, DispatchConfig, HostId, HostState, JobKey, Priority};

use crate::manager::SpawnQueueManager;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_PER_CYCLE: usize = 64;

/// A committed (task, host) decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub key: JobKey,
    pub priority: Priority,
    pub host: HostId,
    /// Time the task spent queued.
    #[serde(rename = "waited_ms", serialize_with = "as_millis")]
    pub waited: Duration,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(millis(*d))
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Knobs for one dispatch cycle and the loop around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub interval: Duration,
    /// Upper bound on placements per cycle; zero means unbounded.
    pub max_per_cycle: usize,
    pub require_available_slot: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_per_cycle: DEFAULT_MAX_PER_CYCLE,
            require_available_slot: true,
        }
    }
}

impl DispatchSettings {
    pub fn from_config(config: &DispatchConfig) -> ConfigResult<Self> {
        Ok(Self {
            interval: config.interval()?,
            max_per_cycle: config.max_per_cycle,
            require_available_slot: config.require_available_slot,
        })
    }
}

/// Source of host availability snapshots (the cluster membership layer).
pub trait HostFeed: Send {
    fn latest(&mut self) -> anyhow::Result<Vec<HostState>>;
}

/// A feed that always reports the same hosts.
impl HostFeed for Vec<HostState> {
    fn latest(&mut self) -> anyhow::Result<Vec<HostState>> {
        Ok(self.clone())
    }
}

/// Drives a [`SpawnQueueManager`] on a fixed interval.
pub struct DispatchLoop {
    manager: Arc<SpawnQueueManager>,
    settings: DispatchSettings,
}

impl DispatchLoop {
    pub fn new(manager: Arc<SpawnQueueManager>, settings: DispatchSettings) -> Self {
        Self { manager, settings }
    }

    /// Refresh hosts from `feed` and run one dispatch cycle.
    ///
    /// A failing feed keeps the previous slot table; its local decrements
    /// still prevent double booking.
    pub fn tick<F: HostFeed>(&self, feed: &mut F) -> Vec<Placement> {
        match feed.latest() {
            Ok(snapshot) => self.manager.update_availability(&snapshot),
            Err(e) => warn!(error = %e, "host feed failed, keeping previous availability"),
        }
        self.manager.run_dispatch_cycle(&self.settings)
    }

    /// Run until `shutdown` fires or the placement receiver is dropped.
    pub async fn run<F: HostFeed>(
        &self,
        mut feed: F,
        placements: mpsc::Sender<Placement>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            interval_ms = millis(self.settings.interval),
            max_per_cycle = self.settings.max_per_cycle,
            "dispatch loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {
                    for placement in self.tick(&mut feed) {
                        if placements.send(placement).await.is_err() {
                            info!("placement receiver closed, dispatch loop stopping");
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("dispatch loop shutting down");
                    break;
                }
            }
        }
    }
}
