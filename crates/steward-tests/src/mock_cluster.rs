//! In-memory cluster harness for scheduler and checker tests.
//!
//! Implements the `Cluster` trait over plain maps with the update helpers
//! the scenario suites need. "Random" region picks are deterministic
//! (lowest region id first) so test expectations stay stable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use steward_model::{DownPeer, FlowKind, Peer, PeerId, Region, RegionId, Store, StoreId, StoreState};
use steward_schedule::hot_cache::{FlowStats, REGION_HEARTBEAT_REPORT_INTERVAL_SECS};
use steward_schedule::{Cluster, HotCache, Operator, ScheduleConfig, Step};

/// Default approximate size given to regions created by the helpers, MiB.
pub const MOCK_REGION_SIZE: u64 = 10;

/// Scale factor from resource counts to sizes in the store helpers.
pub const MOCK_SIZE_PER_COUNT: i64 = 10;

const MOCK_STORAGE_CAPACITY: u64 = 100 * 1024 * 1024 * 1024;

/// The in-memory cluster double used across the scenario suites.
pub struct MockCluster {
    /// Scheduling configuration handed to the code under test.
    pub config: ScheduleConfig,
    stores: Mutex<BTreeMap<StoreId, Store>>,
    regions: Mutex<BTreeMap<RegionId, Region>>,
    hot_cache: HotCache,
    id_alloc: AtomicU64,
    clock_secs: AtomicU64,
}

impl MockCluster {
    /// A cluster with default configuration and no stores.
    pub fn new() -> Self {
        Self::with_config(ScheduleConfig::default())
    }

    /// A cluster with explicit configuration.
    pub fn with_config(config: ScheduleConfig) -> Self {
        Self {
            config,
            stores: Mutex::new(BTreeMap::new()),
            regions: Mutex::new(BTreeMap::new()),
            hot_cache: HotCache::new(),
            id_alloc: AtomicU64::new(0),
            clock_secs: AtomicU64::new(0),
        }
    }

    fn alloc_id(&self) -> u64 {
        self.id_alloc.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn put_store(&self, store: Store) {
        self.stores.lock().unwrap().insert(store.id, store);
    }

    /// Inserts or replaces a region verbatim.
    pub fn put_region(&self, region: Region) {
        self.regions.lock().unwrap().insert(region.id, region);
    }

    fn update_store<F: FnOnce(&mut Store)>(&self, id: u64, f: F) {
        let mut stores = self.stores.lock().unwrap();
        if let Some(store) = stores.get_mut(&StoreId::new(id)) {
            f(store);
        }
    }

    fn base_store(&self, id: u64) -> Store {
        let mut store = Store::new(StoreId::new(id));
        store.storage_capacity = MOCK_STORAGE_CAPACITY;
        store.storage_available = MOCK_STORAGE_CAPACITY / 2;
        store
    }

    /// Adds an Up store holding `leader_count` leaders.
    pub fn add_leader_store(&self, id: u64, leader_count: u64) {
        let mut store = self.base_store(id);
        store.leader_count = leader_count;
        store.leader_size = leader_count as i64 * MOCK_SIZE_PER_COUNT;
        self.put_store(store);
    }

    /// Adds an Up store holding `region_count` replicas.
    pub fn add_region_store(&self, id: u64, region_count: u64) {
        let mut store = self.base_store(id);
        store.region_count = region_count;
        store.region_size = region_count as i64 * MOCK_SIZE_PER_COUNT;
        self.put_store(store);
    }

    /// Adds an Up store with replicas and topology labels.
    pub fn add_labels_store(&self, id: u64, region_count: u64, labels: &[(&str, &str)]) {
        let mut store = self.base_store(id);
        store.region_count = region_count;
        store.region_size = region_count as i64 * MOCK_SIZE_PER_COUNT;
        for (key, value) in labels {
            store.labels.insert(key.to_string(), value.to_string());
        }
        self.put_store(store);
    }

    /// Rewrites a store's leader count and size.
    pub fn update_leader_count(&self, id: u64, leader_count: u64) {
        self.update_store(id, |s| {
            s.leader_count = leader_count;
            s.leader_size = leader_count as i64 * MOCK_SIZE_PER_COUNT;
        });
    }

    /// Rewrites a store's region count and size.
    pub fn update_region_count(&self, id: u64, region_count: u64) {
        self.update_store(id, |s| {
            s.region_count = region_count;
            s.region_size = region_count as i64 * MOCK_SIZE_PER_COUNT;
        });
    }

    /// Rewrites a store's in-flight snapshot count.
    pub fn update_snapshot_count(&self, id: u64, count: u64) {
        self.update_store(id, |s| s.snapshot_count = count);
    }

    /// Rewrites a store's pending peer count.
    pub fn update_pending_peer_count(&self, id: u64, count: u64) {
        self.update_store(id, |s| s.pending_peer_count = count);
    }

    /// Sets used and available space as fractions of capacity.
    pub fn update_storage_ratio(&self, id: u64, used: f64, available: f64) {
        let _ = used;
        self.update_store(id, |s| {
            s.storage_capacity = MOCK_STORAGE_CAPACITY;
            s.storage_available = (available * MOCK_STORAGE_CAPACITY as f64) as u64;
        });
    }

    /// Sets a store's leader scheduling weight.
    pub fn update_store_leader_weight(&self, id: u64, weight: f64) {
        self.update_store(id, |s| s.leader_weight = weight);
    }

    /// Sets a store's region scheduling weight.
    pub fn update_store_region_weight(&self, id: u64, weight: f64) {
        self.update_store(id, |s| s.region_weight = weight);
    }

    /// Sets a store's reported written bytes per store heartbeat.
    pub fn update_storage_written_bytes(&self, id: u64, bytes: u64) {
        self.update_store(id, |s| s.written_bytes = bytes);
    }

    /// Sets a store's reported read bytes per store heartbeat.
    pub fn update_storage_read_bytes(&self, id: u64, bytes: u64) {
        self.update_store(id, |s| s.read_bytes = bytes);
    }

    /// Returns a store to service.
    pub fn set_store_up(&self, id: u64) {
        self.update_store(id, |s| {
            s.state = StoreState::Up;
            s.down_seconds = 0;
        });
    }

    /// Marks a store unreachable well past the down threshold.
    pub fn set_store_down(&self, id: u64) {
        self.update_store(id, |s| {
            s.state = StoreState::Down;
            s.down_seconds = 24 * 60 * 60;
        });
    }

    /// Marks a store as draining.
    pub fn set_store_offline(&self, id: u64) {
        self.update_store(id, |s| s.state = StoreState::Offline);
    }

    /// Sets or clears a store's busy flag.
    pub fn set_store_busy(&self, id: u64, busy: bool) {
        self.update_store(id, |s| s.busy = busy);
    }

    fn build_region(&self, id: u64, leader_store: u64, follower_stores: &[u64]) -> Region {
        let mut region = Region::new(RegionId::new(id));
        let leader = Peer {
            id: PeerId::new(self.alloc_id()),
            store_id: StoreId::new(leader_store),
        };
        region.peers.push(leader);
        for store in follower_stores {
            region.peers.push(Peer {
                id: PeerId::new(self.alloc_id()),
                store_id: StoreId::new(*store),
            });
        }
        region.leader = Some(leader);
        region.approximate_size = MOCK_REGION_SIZE;
        region
    }

    /// Adds (or replaces) a region led from `leader_store`.
    pub fn add_leader_region(&self, id: u64, leader_store: u64, follower_stores: &[u64]) {
        let region = self.build_region(id, leader_store, follower_stores);
        self.put_region(region);
    }

    /// Adds a region with an explicit key range.
    pub fn add_leader_region_with_range(
        &self,
        id: u64,
        start: &str,
        end: &str,
        leader_store: u64,
        follower_stores: &[u64],
    ) {
        let mut region = self.build_region(id, leader_store, follower_stores);
        region.start_key = start.as_bytes().to_vec();
        region.end_key = end.as_bytes().to_vec();
        self.put_region(region);
    }

    /// Adds a region reporting `written_bytes` over the last heartbeat and
    /// feeds the hot cache.
    pub fn add_leader_region_with_write_info(
        &self,
        id: u64,
        leader_store: u64,
        written_bytes: u64,
        follower_stores: &[u64],
    ) {
        let mut region = self.build_region(id, leader_store, follower_stores);
        region.written_bytes = written_bytes;
        self.put_region(region.clone());
        let now = self.tick_clock();
        self.hot_cache
            .update(FlowKind::Write, &region, &self.get_stores(), now);
    }

    /// Adds a region reporting `read_bytes` over the last heartbeat and
    /// feeds the hot cache.
    pub fn add_leader_region_with_read_info(
        &self,
        id: u64,
        leader_store: u64,
        read_bytes: u64,
        follower_stores: &[u64],
    ) {
        let mut region = self.build_region(id, leader_store, follower_stores);
        region.read_bytes = read_bytes;
        self.put_region(region.clone());
        let now = self.tick_clock();
        self.hot_cache
            .update(FlowKind::Read, &region, &self.get_stores(), now);
    }

    fn tick_clock(&self) -> u64 {
        self.clock_secs
            .fetch_add(REGION_HEARTBEAT_REPORT_INTERVAL_SECS, Ordering::Relaxed)
    }

    /// Removes a region outright.
    pub fn remove_region(&self, id: u64) {
        self.regions.lock().unwrap().remove(&RegionId::new(id));
    }

    /// Marks the peer on `store_id` down for `down_seconds`.
    pub fn set_region_down_peer(&self, region_id: u64, store_id: u64, down_seconds: u64) {
        let mut regions = self.regions.lock().unwrap();
        if let Some(region) = regions.get_mut(&RegionId::new(region_id)) {
            if let Some(peer) = region.store_peer(StoreId::new(store_id)) {
                region.down_peers.push(DownPeer { peer, down_seconds });
            }
        }
    }

    /// Applies an operator's steps to the model, the way the dispatcher and
    /// the next round of heartbeats eventually would.
    pub fn apply_operator(&self, op: &Operator) {
        for step in op.steps() {
            match *step {
                Step::MergeRegion {
                    from_region,
                    to_region,
                    is_passive,
                } => {
                    if !is_passive {
                        self.apply_merge(from_region, to_region);
                    }
                }
                _ => self.apply_step(op.region_id(), step),
            }
        }
    }

    fn apply_step(&self, region_id: RegionId, step: &Step) {
        let mut regions = self.regions.lock().unwrap();
        let region = match regions.get_mut(&region_id) {
            Some(r) => r,
            None => return,
        };
        let size = region.approximate_size as i64;
        let mut stores = self.stores.lock().unwrap();
        match *step {
            Step::TransferLeader { from_store, to_store } => {
                let new_leader = match region.store_peer(to_store) {
                    Some(p) => p,
                    None => return,
                };
                region.leader = Some(new_leader);
                if let Some(store) = stores.get_mut(&from_store) {
                    store.leader_count = store.leader_count.saturating_sub(1);
                    store.leader_size -= size;
                }
                if let Some(store) = stores.get_mut(&to_store) {
                    store.leader_count += 1;
                    store.leader_size += size;
                }
            }
            Step::AddPeer { to_store, peer_id } => {
                region.peers.push(Peer {
                    id: peer_id,
                    store_id: to_store,
                });
                if let Some(store) = stores.get_mut(&to_store) {
                    store.region_count += 1;
                    store.region_size += size;
                }
            }
            Step::RemovePeer { from_store } => {
                region.remove_store_peer(from_store);
                if let Some(store) = stores.get_mut(&from_store) {
                    store.region_count = store.region_count.saturating_sub(1);
                    store.region_size -= size;
                }
            }
            Step::MergeRegion { .. } => {}
        }
    }

    fn apply_merge(&self, from_id: RegionId, to_id: RegionId) {
        let mut regions = self.regions.lock().unwrap();
        let from = match regions.remove(&from_id) {
            Some(r) => r,
            None => return,
        };
        let to = match regions.get_mut(&to_id) {
            Some(r) => r,
            None => return,
        };
        if !from.end_key.is_empty() && from.end_key == to.start_key {
            to.start_key = from.start_key.clone();
        } else {
            to.end_key = from.end_key.clone();
        }
        to.approximate_size += from.approximate_size;
        let size = from.approximate_size as i64;
        let mut stores = self.stores.lock().unwrap();
        for peer in &from.peers {
            if let Some(store) = stores.get_mut(&peer.store_id) {
                store.region_count = store.region_count.saturating_sub(1);
                store.region_size -= size;
            }
        }
        if let Some(leader_store) = from.leader_store_id() {
            if let Some(store) = stores.get_mut(&leader_store) {
                store.leader_count = store.leader_count.saturating_sub(1);
                store.leader_size -= size;
            }
        }
    }

    fn regions_sorted(&self) -> Vec<Region> {
        self.regions.lock().unwrap().values().cloned().collect()
    }
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster for MockCluster {
    fn get_stores(&self) -> Vec<Store> {
        self.stores.lock().unwrap().values().cloned().collect()
    }

    fn get_store(&self, id: StoreId) -> Option<Store> {
        self.stores.lock().unwrap().get(&id).cloned()
    }

    fn get_region(&self, id: RegionId) -> Option<Region> {
        self.regions.lock().unwrap().get(&id).cloned()
    }

    fn get_adjacent_regions(&self, region: &Region) -> (Option<Region>, Option<Region>) {
        let regions = self.regions_sorted();
        let prev = regions
            .iter()
            .find(|r| {
                !region.start_key.is_empty()
                    && !r.end_key.is_empty()
                    && r.end_key == region.start_key
            })
            .cloned();
        let next = regions
            .iter()
            .find(|r| !region.end_key.is_empty() && r.start_key == region.end_key)
            .cloned();
        (prev, next)
    }

    fn scan_regions(&self, start_key: &[u8], limit: usize) -> Vec<Region> {
        let mut regions = self.regions_sorted();
        regions.sort_by(|a, b| a.start_key.cmp(&b.start_key));
        regions
            .into_iter()
            .filter(|r| r.start_key.as_slice() >= start_key)
            .take(limit)
            .collect()
    }

    fn rand_leader_region(&self, store_id: StoreId) -> Option<Region> {
        self.regions_sorted()
            .into_iter()
            .find(|r| r.leader_store_id() == Some(store_id))
    }

    fn rand_follower_region(&self, store_id: StoreId) -> Option<Region> {
        self.regions_sorted().into_iter().find(|r| {
            r.leader_store_id() != Some(store_id) && r.store_peer(store_id).is_some()
        })
    }

    fn rand_hot_region_from_store(&self, store_id: StoreId, kind: FlowKind) -> Option<Region> {
        let stats = self
            .hot_cache
            .store_stats(kind, store_id, self.config.hot_region_low_threshold);
        let stat = stats.first()?;
        let mut region = self.get_region(stat.region_id)?;
        match kind {
            FlowKind::Read => region.read_bytes = stat.flow_bytes,
            FlowKind::Write => region.written_bytes = stat.flow_bytes,
        }
        Some(region)
    }

    fn is_region_hot(&self, region_id: RegionId) -> bool {
        self.hot_cache
            .is_region_hot(region_id, self.config.hot_region_low_threshold)
    }

    fn region_flow_stats(&self, kind: FlowKind) -> Vec<FlowStats> {
        self.hot_cache.region_stats(kind)
    }

    fn alloc_peer(&self, store_id: StoreId) -> Option<Peer> {
        Some(Peer {
            id: PeerId::new(self.alloc_id()),
            store_id,
        })
    }

    fn config(&self) -> &ScheduleConfig {
        &self.config
    }
}
