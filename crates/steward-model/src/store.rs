//! Storage node snapshot as seen by the scheduling core.
//!
//! A `Store` is immutable within one scheduling tick; the cluster model
//! refreshes it from store heartbeats between ticks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{ResourceKind, StoreId};

/// Lifecycle state of a store as reported by the cluster model
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreState {
    /// Serving normally
    Up,
    /// Being drained; still serves but should not gain new replicas
    Offline,
    /// Unreachable past the failure-detection threshold
    Down,
    /// Fully removed; only kept for id-reuse protection
    Tombstone,
}

/// One storage node with the counters and sizes the schedulers score on
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Store {
    /// Unique store identifier
    pub id: StoreId,
    /// Lifecycle state
    pub state: StoreState,
    /// Set while the store is overloaded and should be left alone
    pub busy: bool,
    /// Admin override excluding the store from scheduling
    pub blocked: bool,
    /// Number of region leaders hosted here
    pub leader_count: u64,
    /// Number of region peers hosted here
    pub region_count: u64,
    /// Peers still receiving their snapshot
    pub pending_peer_count: u64,
    /// Snapshots currently being sent, received, or applied
    pub snapshot_count: u64,
    /// Total size of leader regions in MiB
    pub leader_size: i64,
    /// Total size of region replicas in MiB
    pub region_size: i64,
    /// Raw storage capacity in bytes
    pub storage_capacity: u64,
    /// Raw storage still available in bytes
    pub storage_available: u64,
    /// Bytes written during the last store heartbeat interval
    pub written_bytes: u64,
    /// Bytes read during the last store heartbeat interval
    pub read_bytes: u64,
    /// Scheduling weight for leader placement; 0 disables the store
    pub leader_weight: f64,
    /// Scheduling weight for replica placement; 0 disables the store
    pub region_weight: f64,
    /// Seconds since the last heartbeat was received
    pub down_seconds: u64,
    /// Topology labels, e.g. zone/rack/host
    pub labels: BTreeMap<String, String>,
}

impl Store {
    /// Creates an Up store with neutral weights and empty counters
    pub fn new(id: StoreId) -> Self {
        Self {
            id,
            state: StoreState::Up,
            busy: false,
            blocked: false,
            leader_count: 0,
            region_count: 0,
            pending_peer_count: 0,
            snapshot_count: 0,
            leader_size: 0,
            region_size: 0,
            storage_capacity: 0,
            storage_available: 0,
            written_bytes: 0,
            read_bytes: 0,
            leader_weight: 1.0,
            region_weight: 1.0,
            down_seconds: 0,
            labels: BTreeMap::new(),
        }
    }

    /// Returns true if the store is in the Up state
    pub fn is_up(&self) -> bool {
        self.state == StoreState::Up
    }

    /// Returns true if the store is being drained
    pub fn is_offline(&self) -> bool {
        self.state == StoreState::Offline
    }

    /// Returns true if the store is unreachable
    pub fn is_down(&self) -> bool {
        self.state == StoreState::Down
    }

    /// Returns true if the store has been removed
    pub fn is_tombstone(&self) -> bool {
        self.state == StoreState::Tombstone
    }

    /// Returns the label value for a key, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Size of the given resource in MiB
    pub fn resource_size(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Leader => self.leader_size,
            ResourceKind::Region => self.region_size,
        }
    }

    /// Count of the given resource
    pub fn resource_count(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Leader => self.leader_count,
            ResourceKind::Region => self.region_count,
        }
    }

    /// Scheduling weight for the given resource
    pub fn resource_weight(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Leader => self.leader_weight,
            ResourceKind::Region => self.region_weight,
        }
    }

    /// Weighted size score used to rank stores; a zero weight scores the
    /// store infinitely loaded so it is drained first and never filled
    pub fn resource_score(&self, kind: ResourceKind, delta: i64) -> f64 {
        let weight = self.resource_weight(kind);
        if weight <= 0.0 {
            return f64::INFINITY;
        }
        (self.resource_size(kind) + delta) as f64 / weight
    }

    /// Fraction of raw storage still available, in [0, 1]
    pub fn storage_available_ratio(&self) -> f64 {
        if self.storage_capacity == 0 {
            return 1.0;
        }
        self.storage_available as f64 / self.storage_capacity as f64
    }

    /// Returns the smallest label index at which two stores differ, walking
    /// labels in priority order; None when every listed label matches
    pub fn compare_location(&self, other: &Store, labels: &[String]) -> Option<usize> {
        for (i, key) in labels.iter().enumerate() {
            if self.label(key) != other.label(key) {
                return Some(i);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled_store(id: u64, zone: &str, rack: &str, host: &str) -> Store {
        let mut store = Store::new(StoreId::new(id));
        store.labels.insert("zone".to_string(), zone.to_string());
        store.labels.insert("rack".to_string(), rack.to_string());
        store.labels.insert("host".to_string(), host.to_string());
        store
    }

    #[test]
    fn resource_score_uses_weight() {
        let mut store = Store::new(StoreId::new(1));
        store.leader_size = 100;
        store.leader_weight = 0.5;
        assert_eq!(store.resource_score(ResourceKind::Leader, 0), 200.0);
        assert_eq!(store.resource_score(ResourceKind::Leader, 50), 300.0);
    }

    #[test]
    fn zero_weight_scores_infinite() {
        let mut store = Store::new(StoreId::new(1));
        store.region_size = 10;
        store.region_weight = 0.0;
        assert!(store.resource_score(ResourceKind::Region, 0).is_infinite());
    }

    #[test]
    fn storage_ratio_empty_capacity_counts_as_free() {
        let store = Store::new(StoreId::new(1));
        assert_eq!(store.storage_available_ratio(), 1.0);
    }

    #[test]
    fn compare_location_finds_first_differing_label() {
        let labels: Vec<String> = ["zone", "rack", "host"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let a = labeled_store(1, "z1", "r1", "h1");
        let b = labeled_store(2, "z1", "r2", "h1");
        let c = labeled_store(3, "z1", "r1", "h1");
        assert_eq!(a.compare_location(&b, &labels), Some(1));
        assert_eq!(a.compare_location(&c, &labels), None);
    }

    #[test]
    fn state_predicates() {
        let mut store = Store::new(StoreId::new(1));
        assert!(store.is_up());
        store.state = StoreState::Offline;
        assert!(store.is_offline() && !store.is_up());
        store.state = StoreState::Down;
        assert!(store.is_down());
        store.state = StoreState::Tombstone;
        assert!(store.is_tombstone());
    }
}
