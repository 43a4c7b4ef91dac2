//! The read-only cluster view consumed by every scheduler and checker.

use steward_model::{FlowKind, Peer, Region, RegionId, Store, StoreId};

use crate::config::ScheduleConfig;
use crate::hot_cache::FlowStats;

/// Read-only access to the cluster model for the duration of one scheduler
/// invocation. Implementations must return a consistent snapshot; values may
/// go stale between invocations but not within one.
pub trait Cluster {
    /// All stores known to the cluster, including non-Up ones.
    fn get_stores(&self) -> Vec<Store>;

    /// A single store by id.
    fn get_store(&self, id: StoreId) -> Option<Store>;

    /// A single region by id.
    fn get_region(&self, id: RegionId) -> Option<Region>;

    /// The stores hosting any peer of the region.
    fn get_region_stores(&self, region: &Region) -> Vec<Store> {
        region
            .store_ids()
            .into_iter()
            .filter_map(|id| self.get_store(id))
            .collect()
    }

    /// The stores hosting the region's followers.
    fn get_follower_stores(&self, region: &Region) -> Vec<Store> {
        region
            .followers()
            .into_iter()
            .filter_map(|p| self.get_store(p.store_id))
            .collect()
    }

    /// The store hosting the region's leader.
    fn get_leader_store(&self, region: &Region) -> Option<Store> {
        self.get_store(region.leader_store_id()?)
    }

    /// The regions whose ranges border the given region on each side.
    fn get_adjacent_regions(&self, region: &Region) -> (Option<Region>, Option<Region>);

    /// Up to `limit` regions in key order starting at `start_key`.
    fn scan_regions(&self, start_key: &[u8], limit: usize) -> Vec<Region>;

    /// A region whose leader lives on the store, or None.
    fn rand_leader_region(&self, store_id: StoreId) -> Option<Region>;

    /// A region with a follower on the store, or None.
    fn rand_follower_region(&self, store_id: StoreId) -> Option<Region>;

    /// A hot region attributed to the store for the given flow, or None.
    fn rand_hot_region_from_store(&self, store_id: StoreId, kind: FlowKind) -> Option<Region>;

    /// True when the region's recent flow classifies it as hot.
    fn is_region_hot(&self, region_id: RegionId) -> bool;

    /// Rolling statistics for every tracked region of the given flow.
    fn region_flow_stats(&self, kind: FlowKind) -> Vec<FlowStats>;

    /// Allocates a fresh peer id on the given store.
    fn alloc_peer(&self, store_id: StoreId) -> Option<Peer>;

    /// The scheduling configuration in force for this tick.
    fn config(&self) -> &ScheduleConfig;

    /// True when the store's labels match the configured reject-leader set.
    fn check_reject_leader_label(&self, store: &Store) -> bool {
        self.config()
            .reject_leader_labels
            .iter()
            .any(|(key, value)| store.label(key) == Some(value.as_str()))
    }
}
