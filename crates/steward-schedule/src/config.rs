//! Scheduling configuration with production defaults.

use serde::{Deserialize, Serialize};

/// Tunables consumed by schedulers and checkers. The cluster model owns one
/// instance and hands it out read-only for the duration of a tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Target replica count per region.
    pub max_replicas: usize,
    /// Topology label keys in priority order, e.g. ["zone", "rack", "host"].
    pub location_labels: Vec<String>,
    /// Multiplier on a candidate move's size inside the balance rule;
    /// prevents oscillation between near-equal stores.
    pub tolerant_size_ratio: f64,
    /// Ceiling on concurrent leader operators.
    pub leader_schedule_limit: u64,
    /// Ceiling on concurrent region operators.
    pub region_schedule_limit: u64,
    /// Ceiling on concurrent replica-repair operators.
    pub replica_schedule_limit: u64,
    /// Ceiling on concurrent merge operator pairs.
    pub merge_schedule_limit: u64,
    /// Ceiling on concurrent hot-region operators.
    pub hot_region_schedule_limit: u64,
    /// A store with this many in-flight snapshots is not a valid target.
    pub max_snapshot_count: u64,
    /// A store with this many pending peers is not a valid target.
    pub max_pending_peer_count: u64,
    /// Seconds a peer must be silent before it is treated as lost.
    pub max_store_down_secs: u64,
    /// Regions at or below this size in MiB are merge candidates.
    pub max_merge_region_size: u64,
    /// Heartbeats a region must stay above the flow threshold before it
    /// counts as hot.
    pub hot_region_low_threshold: u64,
    /// Minimum available-space ratio for a store to accept new replicas.
    pub storage_available_ratio_threshold: f64,
    /// Label pairs that mark a store as refusing leaders.
    pub reject_leader_labels: Vec<(String, String)>,
    /// Region-size floor in MiB below which a drained-weight source store is
    /// left alone; anti-oscillation guard.
    pub low_space_region_size_mib: i64,
    /// Region weight at or below which a store counts as drained for the
    /// guard above.
    pub disabled_region_weight_epsilon: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            max_replicas: 3,
            location_labels: Vec::new(),
            tolerant_size_ratio: 2.5,
            leader_schedule_limit: 64,
            region_schedule_limit: 12,
            replica_schedule_limit: 24,
            merge_schedule_limit: 20,
            hot_region_schedule_limit: 2,
            max_snapshot_count: 3,
            max_pending_peer_count: 16,
            max_store_down_secs: 30 * 60,
            max_merge_region_size: 20,
            hot_region_low_threshold: 3,
            storage_available_ratio_threshold: 0.2,
            reject_leader_labels: Vec::new(),
            low_space_region_size_mib: 6144,
            disabled_region_weight_epsilon: 1e-6,
        }
    }
}
