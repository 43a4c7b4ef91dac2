//! Composable store predicates.
//!
//! A filter marks a store ineligible as a source, a target, or both. Filters
//! compose by logical OR: a store survives a pipeline only when no filter
//! marks it.

use std::collections::HashSet;
use std::sync::Arc;

use steward_model::{Store, StoreId};

use crate::cluster::Cluster;
use crate::selector::distinct_score;
use crate::taint::TaintCache;

/// One predicate pair over stores.
pub trait Filter: Send + Sync {
    /// True when the store must not be used as a move source.
    fn filter_source(&self, cluster: &dyn Cluster, store: &Store) -> bool;

    /// True when the store must not be used as a move target.
    fn filter_target(&self, cluster: &dyn Cluster, store: &Store) -> bool;
}

/// True when any filter in the pipeline rejects the store as a source.
pub fn filter_source(cluster: &dyn Cluster, store: &Store, filters: &[Box<dyn Filter>]) -> bool {
    filters.iter().any(|f| f.filter_source(cluster, store))
}

/// True when any filter in the pipeline rejects the store as a target.
pub fn filter_target(cluster: &dyn Cluster, store: &Store, filters: &[Box<dyn Filter>]) -> bool {
    filters.iter().any(|f| f.filter_target(cluster, store))
}

/// Excludes explicit store sets on either side.
pub struct ExcludedFilter {
    sources: HashSet<StoreId>,
    targets: HashSet<StoreId>,
}

impl ExcludedFilter {
    /// Builds a filter from explicit exclusion sets.
    pub fn new(sources: Vec<StoreId>, targets: Vec<StoreId>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            targets: targets.into_iter().collect(),
        }
    }

    /// Excludes the stores only as targets.
    pub fn targets_only(targets: Vec<StoreId>) -> Self {
        Self::new(Vec::new(), targets)
    }
}

impl Filter for ExcludedFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        self.sources.contains(&store.id)
    }

    fn filter_target(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        self.targets.contains(&store.id)
    }
}

/// Excludes admin-blocked stores entirely.
pub struct BlockFilter;

impl Filter for BlockFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        store.blocked
    }

    fn filter_target(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        store.blocked
    }
}

/// Excludes tombstoned stores always, down stores on both sides, and
/// offline stores as targets. An offline store still serves, so it remains
/// a valid source while it drains.
pub struct StateFilter;

impl Filter for StateFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        store.is_tombstone() || store.is_down()
    }

    fn filter_target(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        !store.is_up()
    }
}

/// Excludes busy and down stores on both sides.
pub struct HealthFilter;

impl Filter for HealthFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        store.busy || store.is_down()
    }

    fn filter_target(&self, cluster: &dyn Cluster, store: &Store) -> bool {
        self.filter_source(cluster, store)
    }
}

/// Excludes stores matching the reject-leader label set as leader targets.
pub struct RejectLeaderFilter;

impl Filter for RejectLeaderFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, _store: &Store) -> bool {
        false
    }

    fn filter_target(&self, cluster: &dyn Cluster, store: &Store) -> bool {
        cluster.check_reject_leader_label(store)
    }
}

/// Excludes stores currently in a taint cache, on both sides.
pub struct CacheFilter {
    cache: Arc<TaintCache>,
}

impl CacheFilter {
    /// Wraps a shared taint cache.
    pub fn new(cache: Arc<TaintCache>) -> Self {
        Self { cache }
    }
}

impl Filter for CacheFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        self.cache.contains(store.id)
    }

    fn filter_target(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        self.cache.contains(store.id)
    }
}

/// Rejects targets with too many in-flight snapshots.
pub struct SnapshotCountFilter;

impl Filter for SnapshotCountFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, _store: &Store) -> bool {
        false
    }

    fn filter_target(&self, cluster: &dyn Cluster, store: &Store) -> bool {
        store.snapshot_count >= cluster.config().max_snapshot_count
    }
}

/// Rejects targets short on disk space.
pub struct StorageThresholdFilter;

impl Filter for StorageThresholdFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, _store: &Store) -> bool {
        false
    }

    fn filter_target(&self, cluster: &dyn Cluster, store: &Store) -> bool {
        store.storage_available_ratio() < cluster.config().storage_available_ratio_threshold
    }
}

/// Rejects targets with too many peers still receiving snapshots.
pub struct PendingPeerCountFilter;

impl Filter for PendingPeerCountFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, _store: &Store) -> bool {
        false
    }

    fn filter_target(&self, cluster: &dyn Cluster, store: &Store) -> bool {
        store.pending_peer_count >= cluster.config().max_pending_peer_count
    }
}

/// Guarantees a replacement cannot reduce a region's topology diversity.
///
/// The safe score is the distinct score of the peer being replaced against
/// the rest of the region's stores; any target scoring below it is rejected.
pub struct DistinctScoreFilter {
    labels: Vec<String>,
    stores: Vec<Store>,
    safe_score: f64,
}

impl DistinctScoreFilter {
    /// Builds the guard for replacing `source`'s peer in a region hosted on
    /// `stores` (which includes `source`).
    pub fn new(labels: Vec<String>, stores: Vec<Store>, source: &Store) -> Self {
        let rest: Vec<Store> = stores
            .iter()
            .filter(|s| s.id != source.id)
            .cloned()
            .collect();
        let safe_score = distinct_score(&labels, &rest, source);
        Self {
            labels,
            stores: rest,
            safe_score,
        }
    }
}

impl Filter for DistinctScoreFilter {
    fn filter_source(&self, _cluster: &dyn Cluster, _store: &Store) -> bool {
        false
    }

    fn filter_target(&self, _cluster: &dyn Cluster, store: &Store) -> bool {
        distinct_score(&self.labels, &self.stores, store) < self.safe_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScheduleConfig;
    use steward_model::{FlowKind, Peer, Region, RegionId, StoreState};

    struct ConfigOnly {
        config: ScheduleConfig,
    }

    impl Cluster for ConfigOnly {
        fn get_stores(&self) -> Vec<Store> {
            Vec::new()
        }
        fn get_store(&self, _id: StoreId) -> Option<Store> {
            None
        }
        fn get_region(&self, _id: RegionId) -> Option<Region> {
            None
        }
        fn get_adjacent_regions(&self, _region: &Region) -> (Option<Region>, Option<Region>) {
            (None, None)
        }
        fn scan_regions(&self, _start_key: &[u8], _limit: usize) -> Vec<Region> {
            Vec::new()
        }
        fn rand_leader_region(&self, _store_id: StoreId) -> Option<Region> {
            None
        }
        fn rand_follower_region(&self, _store_id: StoreId) -> Option<Region> {
            None
        }
        fn rand_hot_region_from_store(&self, _store_id: StoreId, _kind: FlowKind) -> Option<Region> {
            None
        }
        fn is_region_hot(&self, _region_id: RegionId) -> bool {
            false
        }
        fn region_flow_stats(&self, _kind: FlowKind) -> Vec<crate::hot_cache::FlowStats> {
            Vec::new()
        }
        fn alloc_peer(&self, _store_id: StoreId) -> Option<Peer> {
            None
        }
        fn config(&self) -> &ScheduleConfig {
            &self.config
        }
    }

    fn cluster() -> ConfigOnly {
        ConfigOnly {
            config: ScheduleConfig::default(),
        }
    }

    #[test]
    fn state_filter_keeps_offline_sources() {
        let cluster = cluster();
        let mut store = Store::new(StoreId::new(1));
        store.state = StoreState::Offline;
        assert!(!StateFilter.filter_source(&cluster, &store));
        assert!(StateFilter.filter_target(&cluster, &store));
        store.state = StoreState::Down;
        assert!(StateFilter.filter_source(&cluster, &store));
        store.state = StoreState::Tombstone;
        assert!(StateFilter.filter_source(&cluster, &store));
    }

    #[test]
    fn health_filter_rejects_busy_both_ways() {
        let cluster = cluster();
        let mut store = Store::new(StoreId::new(1));
        store.busy = true;
        assert!(HealthFilter.filter_source(&cluster, &store));
        assert!(HealthFilter.filter_target(&cluster, &store));
    }

    #[test]
    fn snapshot_filter_applies_to_targets_only() {
        let cluster = cluster();
        let mut store = Store::new(StoreId::new(1));
        store.snapshot_count = 3;
        assert!(!SnapshotCountFilter.filter_source(&cluster, &store));
        assert!(SnapshotCountFilter.filter_target(&cluster, &store));
        store.snapshot_count = 2;
        assert!(!SnapshotCountFilter.filter_target(&cluster, &store));
    }

    #[test]
    fn storage_filter_tracks_available_ratio() {
        let cluster = cluster();
        let mut store = Store::new(StoreId::new(1));
        store.storage_capacity = 100;
        store.storage_available = 10;
        assert!(StorageThresholdFilter.filter_target(&cluster, &store));
        store.storage_available = 30;
        assert!(!StorageThresholdFilter.filter_target(&cluster, &store));
    }

    #[test]
    fn cache_filter_blocks_both_sides() {
        let cluster = cluster();
        let taint = Arc::new(TaintCache::new());
        taint.put(StoreId::new(1));
        let filter = CacheFilter::new(taint);
        let tainted = Store::new(StoreId::new(1));
        let clean = Store::new(StoreId::new(2));
        assert!(filter.filter_source(&cluster, &tainted));
        assert!(filter.filter_target(&cluster, &tainted));
        assert!(!filter.filter_source(&cluster, &clean));
    }

    #[test]
    fn reject_leader_filter_matches_configured_labels() {
        let mut cluster = cluster();
        cluster.config.reject_leader_labels =
            vec![("noleader".to_string(), "true".to_string())];
        let mut store = Store::new(StoreId::new(1));
        store
            .labels
            .insert("noleader".to_string(), "true".to_string());
        assert!(RejectLeaderFilter.filter_target(&cluster, &store));
        assert!(!RejectLeaderFilter.filter_source(&cluster, &store));
        assert!(!RejectLeaderFilter.filter_target(&cluster, &Store::new(StoreId::new(2))));
    }

    #[test]
    fn pending_peer_filter_uses_config_ceiling() {
        let cluster = cluster();
        let mut store = Store::new(StoreId::new(1));
        store.pending_peer_count = 16;
        assert!(PendingPeerCountFilter.filter_target(&cluster, &store));
        store.pending_peer_count = 15;
        assert!(!PendingPeerCountFilter.filter_target(&cluster, &store));
    }
}
