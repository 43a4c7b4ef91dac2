//! Redistributes hot read and write traffic using the rolling flow cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use steward_model::{FlowKind, Region, Store, StoreId};
use steward_schedule::filter::{
    filter_target, DistinctScoreFilter, ExcludedFilter, Filter, HealthFilter, StateFilter,
};
use steward_schedule::hot_cache::FlowStats;
use steward_schedule::operator::{move_peer_operator, transfer_leader_operator, OpKind};
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics};

use crate::base::Scheduler;

/// A store must hold at least this many hot regions before it is treated as
/// a source; rebalancing a single hot region around is churn.
const MIN_HOT_REGION_COUNT: usize = 2;

/// Hot load per store for one flow direction.
#[derive(Default)]
struct StoreHotLoad {
    stats: Vec<FlowStats>,
    total_flow: u64,
}

/// Balances hot regions for one flow direction. The write flavour moves
/// replicas first and falls back to leader transfers; the read flavour
/// prefers leader transfers because reads follow the leader.
pub struct BalanceHotRegionsScheduler {
    flow: FlowKind,
    limiter: Arc<OperatorLimiter>,
    metrics: SchedulerMetrics,
}

impl BalanceHotRegionsScheduler {
    /// The hot-write flavour.
    pub fn write(limiter: Arc<OperatorLimiter>) -> Self {
        Self {
            flow: FlowKind::Write,
            limiter,
            metrics: SchedulerMetrics::new(),
        }
    }

    /// The hot-read flavour.
    pub fn read(limiter: Arc<OperatorLimiter>) -> Self {
        Self {
            flow: FlowKind::Read,
            limiter,
            metrics: SchedulerMetrics::new(),
        }
    }

    /// Outcome counters.
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Hot stats attributed to each store. Write flow counts every peer of
    /// a hot region; read flow counts only the leader, since the leader
    /// serves the reads.
    fn hot_load_by_store(&self, cluster: &dyn Cluster, by_peer: bool) -> BTreeMap<StoreId, StoreHotLoad> {
        let low = cluster.config().hot_region_low_threshold;
        let mut loads: BTreeMap<StoreId, StoreHotLoad> = BTreeMap::new();
        for stats in cluster.region_flow_stats(self.flow) {
            if stats.hot_degree < low {
                continue;
            }
            let region = match cluster.get_region(stats.region_id) {
                Some(r) => r,
                None => continue,
            };
            // Skip stale attributions from before a leader moved.
            if region.leader_store_id() != Some(stats.store_id) {
                continue;
            }
            let stores: Vec<StoreId> = if by_peer {
                region.store_ids()
            } else {
                vec![stats.store_id]
            };
            for store_id in stores {
                let load = loads.entry(store_id).or_default();
                load.total_flow += stats.flow_bytes;
                load.stats.push(stats.clone());
            }
        }
        loads
    }

    /// The store with the most hot regions (flow bytes break ties, then the
    /// lower id), provided it holds enough of them to be worth draining.
    fn select_source(loads: &BTreeMap<StoreId, StoreHotLoad>) -> Option<StoreId> {
        let mut best: Option<(StoreId, usize, u64)> = None;
        for (store_id, load) in loads {
            if load.stats.len() < MIN_HOT_REGION_COUNT {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, count, flow)) => {
                    load.stats.len() > count || (load.stats.len() == count && load.total_flow > flow)
                }
            };
            if better {
                best = Some((*store_id, load.stats.len(), load.total_flow));
            }
        }
        best.map(|(id, _, _)| id)
    }

    fn hot_count(loads: &BTreeMap<StoreId, StoreHotLoad>, store_id: StoreId) -> usize {
        loads.get(&store_id).map(|l| l.stats.len()).unwrap_or(0)
    }

    /// Moves a hot region's replica off the loaded store onto the hot-coldest
    /// store that keeps topology diversity.
    fn balance_by_peer(&self, cluster: &dyn Cluster) -> Option<Operator> {
        let by_peer = self.flow == FlowKind::Write;
        let loads = self.hot_load_by_store(cluster, by_peer);
        let source_id = Self::select_source(&loads)?;
        let source_count = Self::hot_count(&loads, source_id);

        for stats in &loads[&source_id].stats {
            let region = match cluster.get_region(stats.region_id) {
                Some(r) => r,
                None => continue,
            };
            if !region.down_peers.is_empty() || !region.pending_peers.is_empty() {
                continue;
            }
            let old_peer = match region.store_peer(source_id) {
                Some(p) => p,
                None => continue,
            };
            let source_store = match cluster.get_store(source_id) {
                Some(s) => s,
                None => continue,
            };
            let filters: Vec<Box<dyn Filter>> = vec![
                Box::new(ExcludedFilter::new(region.store_ids(), region.store_ids())),
                Box::new(StateFilter),
                Box::new(HealthFilter),
                Box::new(DistinctScoreFilter::new(
                    cluster.config().location_labels.clone(),
                    cluster.get_region_stores(&region),
                    &source_store,
                )),
            ];
            let mut candidates: Vec<Store> = cluster
                .get_stores()
                .into_iter()
                .filter(|s| !filter_target(cluster, s, &filters))
                .collect();
            candidates.sort_by_key(|s| s.id);

            let target = candidates
                .into_iter()
                .filter(|s| source_count > Self::hot_count(&loads, s.id) + 1)
                .min_by_key(|s| (Self::hot_count(&loads, s.id), s.id));
            let target = match target {
                Some(t) => t,
                None => continue,
            };
            let new_peer = match cluster.alloc_peer(target.id) {
                Some(p) => p,
                None => continue,
            };
            debug!(
                region_id = %region.id,
                source = %source_id,
                target = %target.id,
                "moving hot region replica"
            );
            self.metrics.new_operator.inc();
            return Some(move_peer_operator(
                "balance-hot-region",
                cluster,
                &region,
                OpKind::HOT_REGION,
                source_id,
                new_peer,
            ));
        }
        None
    }

    /// Hands a hot region's leadership to its hot-coldest follower.
    fn balance_by_leader(&self, cluster: &dyn Cluster) -> Option<Operator> {
        let loads = self.hot_load_by_store(cluster, false);
        let source_id = Self::select_source(&loads)?;
        let source_count = Self::hot_count(&loads, source_id);

        for stats in &loads[&source_id].stats {
            let region = match cluster.get_region(stats.region_id) {
                Some(r) => r,
                None => continue,
            };
            if !region.down_peers.is_empty() || !region.pending_peers.is_empty() {
                continue;
            }
            if region.leader_store_id() != Some(source_id) {
                continue;
            }
            let follower_filters: Vec<Box<dyn Filter>> =
                vec![Box::new(StateFilter), Box::new(HealthFilter)];
            let target = self
                .follower_stores(cluster, &region, &follower_filters)
                .into_iter()
                .filter(|s| source_count > Self::hot_count(&loads, s.id) + 1)
                .min_by_key(|s| (Self::hot_count(&loads, s.id), s.id));
            let target = match target {
                Some(t) => t,
                None => continue,
            };
            debug!(
                region_id = %region.id,
                source = %source_id,
                target = %target.id,
                "transferring hot region leader"
            );
            self.metrics.new_operator.inc();
            return Some(transfer_leader_operator(
                "balance-hot-region-leader",
                &region,
                source_id,
                target.id,
                OpKind::HOT_REGION,
            ));
        }
        None
    }

    fn follower_stores(
        &self,
        cluster: &dyn Cluster,
        region: &Region,
        filters: &[Box<dyn Filter>],
    ) -> Vec<Store> {
        let mut stores: Vec<Store> = cluster
            .get_follower_stores(region)
            .into_iter()
            .filter(|s| !filter_target(cluster, s, filters))
            .collect();
        stores.sort_by_key(|s| s.id);
        stores
    }
}

impl Scheduler for BalanceHotRegionsScheduler {
    fn name(&self) -> &str {
        match self.flow {
            FlowKind::Write => "hot-write-region-scheduler",
            FlowKind::Read => "hot-read-region-scheduler",
        }
    }

    fn scheduler_type(&self) -> &str {
        match self.flow {
            FlowKind::Write => "hot-write-region",
            FlowKind::Read => "hot-read-region",
        }
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        self.limiter.operator_count(OpKind::HOT_REGION)
            < cluster.config().hot_region_schedule_limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, _influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let op = match self.flow {
            FlowKind::Write => self
                .balance_by_peer(cluster)
                .or_else(|| self.balance_by_leader(cluster)),
            FlowKind::Read => self
                .balance_by_leader(cluster)
                .or_else(|| self.balance_by_peer(cluster)),
        };
        match op {
            Some(op) => vec![op],
            None => {
                self.metrics.no_candidate.inc();
                Vec::new()
            }
        }
    }
}
