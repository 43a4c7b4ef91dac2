//! Keeps region replica bytes balanced across stores.

use std::sync::Arc;

use tracing::debug;

use steward_model::{Peer, Region, ResourceKind};
use steward_schedule::filter::{
    CacheFilter, Filter, HealthFilter, PendingPeerCountFilter, SnapshotCountFilter, StateFilter,
    StorageThresholdFilter,
};
use steward_schedule::operator::{move_peer_operator, OpKind};
use steward_schedule::selector::BalanceSelector;
use steward_schedule::{
    Cluster, OpInfluence, Operator, OperatorLimiter, ReplicaChecker, SchedulerMetrics, TaintCache,
};

use crate::base::{adjust_balance_limit, should_balance, Scheduler};

/// Attempts per tick before the selected store is tainted.
pub const BALANCE_REGION_RETRY_LIMIT: usize = 10;

/// Moves one replica per tick off the store with the highest region score.
pub struct BalanceRegionScheduler {
    limiter: Arc<OperatorLimiter>,
    selector: BalanceSelector,
    taint: Arc<TaintCache>,
    metrics: SchedulerMetrics,
}

impl BalanceRegionScheduler {
    /// A scheduler with the standard region filter pipeline.
    pub fn new(limiter: Arc<OperatorLimiter>) -> Self {
        let taint = Arc::new(TaintCache::new());
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(CacheFilter::new(Arc::clone(&taint))),
            Box::new(StateFilter),
            Box::new(HealthFilter),
            Box::new(SnapshotCountFilter),
            Box::new(StorageThresholdFilter),
            Box::new(PendingPeerCountFilter),
        ];
        Self {
            limiter,
            selector: BalanceSelector::new(ResourceKind::Region, filters),
            taint,
            metrics: SchedulerMetrics::new(),
        }
    }

    /// The taint cache owned by this scheduler.
    pub fn taint_cache(&self) -> &Arc<TaintCache> {
        &self.taint
    }

    /// Outcome counters.
    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    fn transfer_peer(
        &self,
        cluster: &dyn Cluster,
        region: &Region,
        old_peer: Peer,
        influence: &OpInfluence,
    ) -> Option<Operator> {
        let checker = ReplicaChecker::new(cluster);
        // The guard keeps the move from reducing topology diversity.
        let guard = checker.score_guard(region, old_peer)?;
        let (new_peer, _) =
            checker.select_best_replacement_peer(region, old_peer, vec![Box::new(guard)])?;

        let source = cluster.get_store(old_peer.store_id)?;
        let target = cluster.get_store(new_peer.store_id)?;
        let source_size = source.region_size + influence.store_influence(source.id).region_size;
        let target_size = target.region_size + influence.store_influence(target.id).region_size;
        let move_size = region.approximate_size as f64 * cluster.config().tolerant_size_ratio;
        if !should_balance(
            source_size,
            source.region_weight,
            target_size,
            target.region_weight,
            move_size,
        ) {
            debug!(
                region_id = %region.id,
                source_size,
                target_size,
                "skip region balance, the move would overshoot"
            );
            self.metrics.skip.inc();
            return None;
        }
        // A nearly empty drained-weight store is left alone so it does not
        // flap between drained and refilled.
        let config = cluster.config();
        if source_size < config.low_space_region_size_mib
            && source.region_weight <= config.disabled_region_weight_epsilon
        {
            self.metrics.skip.inc();
            return None;
        }

        self.metrics.new_operator.inc();
        Some(move_peer_operator(
            "balance-region",
            cluster,
            region,
            OpKind::BALANCE,
            old_peer.store_id,
            new_peer,
        ))
    }
}

impl Scheduler for BalanceRegionScheduler {
    fn name(&self) -> &str {
        "balance-region-scheduler"
    }

    fn scheduler_type(&self) -> &str {
        "balance-region"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        let limit = cluster
            .config()
            .region_schedule_limit
            .min(adjust_balance_limit(cluster, ResourceKind::Region));
        self.limiter.operator_count(OpKind::REGION) < limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let stores = cluster.get_stores();
        let source = match self.selector.select_source(cluster, &stores) {
            Some(s) => s,
            None => {
                self.metrics.no_candidate.inc();
                self.taint.clear();
                return Vec::new();
            }
        };
        debug!(source = %source.id, "balance-region selected highest scored store");

        for _ in 0..BALANCE_REGION_RETRY_LIMIT {
            let region = cluster
                .rand_follower_region(source.id)
                .or_else(|| cluster.rand_leader_region(source.id));
            let region = match region {
                Some(r) => r,
                None => continue,
            };

            // Regions mid-repair are the replica checker's business.
            if region.peers.len() != cluster.config().max_replicas {
                debug!(region_id = %region.id, "region has abnormal replica count");
                continue;
            }
            if cluster.is_region_hot(region.id) {
                debug!(region_id = %region.id, "region is hot");
                continue;
            }
            let old_peer = match region.store_peer(source.id) {
                Some(p) => p,
                None => continue,
            };
            if let Some(op) = self.transfer_peer(cluster, &region, old_peer, influence) {
                return vec![op];
            }
        }

        debug!(source = %source.id, "no region operator created, tainting store");
        self.taint.put(source.id);
        Vec::new()
    }
}
