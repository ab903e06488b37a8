//! Runtime configuration for the heartbeat scheduler's tunables.
//!
//! A single flat struct deserialized with `serde`, using human-readable
//! duration strings (`humantime-serde`) rather than raw integer seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The raft snapshot policy flag. `Dingo` forces
/// `snapshot_epoch_version = i64::MAX` for dingo-managed snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaftSnapshotPolicy {
    /// Standard raft snapshot epoch progression.
    Default,
    /// Forces `snapshot_epoch_version = i64::MAX`.
    Dingo,
}

impl Default for RaftSnapshotPolicy {
    fn default() -> Self {
        Self::Default
    }
}

impl RaftSnapshotPolicy {
    /// The snapshot epoch version implied by this policy, `None` meaning
    /// "use the raft log's own progression".
    pub fn snapshot_epoch_version(&self) -> Option<i64> {
        match self {
            Self::Default => None,
            Self::Dingo => Some(i64::MAX),
        }
    }
}

/// Flags consumed by the heartbeat scheduler's task classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// How long an executor may go without reporting before it's considered
    /// unresponsive.
    #[serde(with = "humantime_serde")]
    pub executor_heartbeat_timeout: Duration,

    /// How long after that before the executor's record is deleted.
    #[serde(with = "humantime_serde")]
    pub executor_delete_after_heartbeat_timeout: Duration,

    /// Store heartbeat staleness threshold.
    #[serde(with = "humantime_serde")]
    pub store_heartbeat_timeout: Duration,

    /// Region heartbeat staleness threshold.
    #[serde(with = "humantime_serde")]
    pub region_heartbeat_timeout: Duration,

    /// How long a region may be marked deleted before it's purged.
    #[serde(with = "humantime_serde")]
    pub region_delete_after_deleted_time: Duration,

    /// A store only needs to report region-level heartbeats once every N
    /// store-level heartbeats.
    pub store_heartbeat_report_region_multiple: u32,

    /// Whether the balance-leader task class is permitted to act.
    pub enable_balance_leader: bool,

    /// Whether the balance-region task class is permitted to act.
    pub enable_balance_region: bool,

    /// Governs `snapshot_epoch_version` for raft snapshots.
    pub raft_snapshot_policy: RaftSnapshotPolicy,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            executor_heartbeat_timeout: Duration::from_secs(30),
            executor_delete_after_heartbeat_timeout: Duration::from_secs(300),
            store_heartbeat_timeout: Duration::from_secs(30),
            region_heartbeat_timeout: Duration::from_secs(30),
            region_delete_after_deleted_time: Duration::from_secs(86_400),
            store_heartbeat_report_region_multiple: 3,
            enable_balance_leader: true,
            enable_balance_region: true,
            raft_snapshot_policy: RaftSnapshotPolicy::Default,
        }
    }
}
