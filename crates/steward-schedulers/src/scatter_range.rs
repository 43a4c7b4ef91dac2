//! Balances one key range in isolation from the rest of the keyspace.

use std::collections::HashMap;
use std::sync::Arc;

use steward_model::{FlowKind, Peer, Region, RegionId, Store, StoreId};
use steward_schedule::hot_cache::FlowStats;
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, ScheduleConfig};

use crate::balance_leader::BalanceLeaderScheduler;
use crate::balance_region::BalanceRegionScheduler;
use crate::base::Scheduler;
use crate::registry::SchedulerError;

const SCAN_BATCH: usize = 1024;

/// A cluster view clipped to `[start_key, end_key)`. Store sizes and counts
/// are recomputed from the regions inside the range so the balance rule
/// reasons about range-local load only.
struct RangeCluster<'a> {
    inner: &'a dyn Cluster,
    regions: Vec<Region>,
    stores: Vec<Store>,
}

impl<'a> RangeCluster<'a> {
    fn new(inner: &'a dyn Cluster, start_key: &[u8], end_key: &[u8]) -> Self {
        let mut regions = Vec::new();
        let mut cursor = start_key.to_vec();
        loop {
            let batch = inner.scan_regions(&cursor, SCAN_BATCH);
            if batch.is_empty() {
                break;
            }
            let mut done = false;
            for region in batch {
                if !end_key.is_empty() && region.start_key.as_slice() >= end_key {
                    done = true;
                    break;
                }
                cursor = region.end_key.clone();
                let ends_keyspace = region.end_key.is_empty();
                regions.push(region);
                if ends_keyspace {
                    done = true;
                    break;
                }
            }
            if done {
                break;
            }
        }

        let mut leader_stats: HashMap<StoreId, (i64, u64)> = HashMap::new();
        let mut region_stats: HashMap<StoreId, (i64, u64)> = HashMap::new();
        for region in &regions {
            let size = region.approximate_size as i64;
            if let Some(leader_store) = region.leader_store_id() {
                let entry = leader_stats.entry(leader_store).or_default();
                entry.0 += size;
                entry.1 += 1;
            }
            for peer in &region.peers {
                let entry = region_stats.entry(peer.store_id).or_default();
                entry.0 += size;
                entry.1 += 1;
            }
        }
        let stores = inner
            .get_stores()
            .into_iter()
            .map(|mut store| {
                let (leader_size, leader_count) =
                    leader_stats.get(&store.id).copied().unwrap_or((0, 0));
                let (region_size, region_count) =
                    region_stats.get(&store.id).copied().unwrap_or((0, 0));
                store.leader_size = leader_size;
                store.leader_count = leader_count;
                store.region_size = region_size;
                store.region_count = region_count;
                store
            })
            .collect();
        Self {
            inner,
            regions,
            stores,
        }
    }

    fn in_range(&self, region_id: RegionId) -> bool {
        self.regions.iter().any(|r| r.id == region_id)
    }
}

impl Cluster for RangeCluster<'_> {
    fn get_stores(&self) -> Vec<Store> {
        self.stores.clone()
    }

    fn get_store(&self, id: StoreId) -> Option<Store> {
        self.stores.iter().find(|s| s.id == id).cloned()
    }

    fn get_region(&self, id: RegionId) -> Option<Region> {
        self.regions
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .or_else(|| self.inner.get_region(id))
    }

    fn get_adjacent_regions(&self, region: &Region) -> (Option<Region>, Option<Region>) {
        let prev = self
            .regions
            .iter()
            .find(|r| !r.end_key.is_empty() && r.end_key == region.start_key)
            .cloned();
        let next = self
            .regions
            .iter()
            .find(|r| !region.end_key.is_empty() && r.start_key == region.end_key)
            .cloned();
        (prev, next)
    }

    fn scan_regions(&self, start_key: &[u8], limit: usize) -> Vec<Region> {
        self.regions
            .iter()
            .filter(|r| r.start_key.as_slice() >= start_key)
            .take(limit)
            .cloned()
            .collect()
    }

    fn rand_leader_region(&self, store_id: StoreId) -> Option<Region> {
        self.regions
            .iter()
            .find(|r| r.leader_store_id() == Some(store_id))
            .cloned()
    }

    fn rand_follower_region(&self, store_id: StoreId) -> Option<Region> {
        self.regions
            .iter()
            .find(|r| {
                r.leader_store_id() != Some(store_id) && r.store_peer(store_id).is_some()
            })
            .cloned()
    }

    fn rand_hot_region_from_store(&self, store_id: StoreId, kind: FlowKind) -> Option<Region> {
        let region = self.inner.rand_hot_region_from_store(store_id, kind)?;
        if self.in_range(region.id) {
            Some(region)
        } else {
            None
        }
    }

    fn is_region_hot(&self, region_id: RegionId) -> bool {
        self.inner.is_region_hot(region_id)
    }

    fn region_flow_stats(&self, kind: FlowKind) -> Vec<FlowStats> {
        self.inner
            .region_flow_stats(kind)
            .into_iter()
            .filter(|s| self.in_range(s.region_id))
            .collect()
    }

    fn alloc_peer(&self, store_id: StoreId) -> Option<Peer> {
        self.inner.alloc_peer(store_id)
    }

    fn config(&self) -> &ScheduleConfig {
        self.inner.config()
    }
}

/// Runs the two balance schedulers against a clipped cluster view so one
/// key range (e.g. a table being imported) spreads out without waiting for
/// global balance.
pub struct ScatterRangeScheduler {
    name: String,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    balance_leader: BalanceLeaderScheduler,
    balance_region: BalanceRegionScheduler,
}

impl ScatterRangeScheduler {
    /// A scheduler over `[start_key, end_key)` tagged with `range_name`.
    pub fn new(
        limiter: Arc<OperatorLimiter>,
        start_key: Vec<u8>,
        end_key: Vec<u8>,
        range_name: &str,
    ) -> Self {
        Self {
            name: format!("scatter-range-{range_name}-scheduler"),
            start_key,
            end_key,
            balance_leader: BalanceLeaderScheduler::new(Arc::clone(&limiter)),
            balance_region: BalanceRegionScheduler::new(limiter),
        }
    }

    /// Parses the `start_key end_key range_name` factory arguments.
    pub fn from_args(
        limiter: Arc<OperatorLimiter>,
        args: &[String],
    ) -> Result<Self, SchedulerError> {
        let [start, end, name] = args else {
            return Err(SchedulerError::InvalidArgs(
                "scatter-range needs start_key, end_key and a range name".into(),
            ));
        };
        Ok(Self::new(
            limiter,
            start.clone().into_bytes(),
            end.clone().into_bytes(),
            name,
        ))
    }
}

impl Scheduler for ScatterRangeScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheduler_type(&self) -> &str {
        "scatter-range"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        self.balance_leader.is_schedule_allowed(cluster)
            || self.balance_region.is_schedule_allowed(cluster)
    }

    fn schedule(&mut self, cluster: &dyn Cluster, influence: &OpInfluence) -> Vec<Operator> {
        let range = RangeCluster::new(cluster, &self.start_key, &self.end_key);
        let ops = self.balance_leader.schedule(&range, influence);
        if !ops.is_empty() {
            return ops;
        }
        self.balance_region.schedule(&range, influence)
    }
}
