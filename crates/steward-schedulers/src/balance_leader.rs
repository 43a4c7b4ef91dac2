//! Keeps leader counts balanced across stores.

use std::sync::Arc;

use tracing::debug;

use steward_model::{Region, ResourceKind, Store};
use steward_schedule::filter::{
    BlockFilter, CacheFilter, Filter, HealthFilter, RejectLeaderFilter, StateFilter,
};
use steward_schedule::operator::{transfer_leader_operator, OpKind};
use steward_schedule::selector::BalanceSelector;
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics, TaintCache};

use crate::base::{adjust_balance_limit, should_balance, Scheduler};

/// Attempts per tick before the selected stores are tainted.
pub const BALANCE_LEADER_RETRY_LIMIT: usize = 10;

/// Moves leaders from the heaviest store to the lightest one, one transfer
/// per tick.
pub struct BalanceLeaderScheduler {
    limiter: Arc<OperatorLimiter>,
    selector: BalanceSelector,
    taint: Arc<TaintCache>,
    metrics: SchedulerMetrics,
}

impl BalanceLeaderScheduler {
    /// A scheduler with the standard leader filter pipeline.
    pub fn new(limiter: Arc<OperatorLimiter>) -> Self {
        let taint = Arc::new(TaintCache::new());
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(BlockFilter),
            Box::new(StateFilter),
            Box::new(HealthFilter),
            Box::new(RejectLeaderFilter),
            Box::new(CacheFilter::new(Arc::clone(&taint))),
        ];
        Self {
            limiter,
            selector: BalanceSelector::new(ResourceKind::Leader, filters),
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

    fn transfer_leader_out(
        &self,
        source: &Store,
        cluster: &dyn Cluster,
        influence: &OpInfluence,
    ) -> Option<Operator> {
        let region = cluster.rand_leader_region(source.id)?;
        let followers = cluster.get_follower_stores(&region);
        let target = match self.selector.select_target(cluster, &followers, &[]) {
            Some(t) => t,
            None => {
                debug!(region_id = %region.id, "region has no target store");
                return None;
            }
        };
        self.create_operator(&region, source, &target, cluster, influence)
    }

    fn transfer_leader_in(
        &self,
        target: &Store,
        cluster: &dyn Cluster,
        influence: &OpInfluence,
    ) -> Option<Operator> {
        let region = cluster.rand_follower_region(target.id)?;
        let source = cluster.get_store(region.leader_store_id()?)?;
        self.create_operator(&region, &source, target, cluster, influence)
    }

    fn create_operator(
        &self,
        region: &Region,
        source: &Store,
        target: &Store,
        cluster: &dyn Cluster,
        influence: &OpInfluence,
    ) -> Option<Operator> {
        let source_size = source.leader_size + influence.store_influence(source.id).leader_size;
        let target_size = target.leader_size + influence.store_influence(target.id).leader_size;
        let move_size = region.approximate_size as f64 * cluster.config().tolerant_size_ratio;
        if !should_balance(
            source_size,
            source.leader_weight,
            target_size,
            target.leader_weight,
            move_size,
        ) {
            debug!(
                region_id = %region.id,
                source_size,
                target_size,
                "skip leader balance, the move would overshoot"
            );
            self.metrics.skip.inc();
            return None;
        }
        self.metrics.new_operator.inc();
        Some(transfer_leader_operator(
            "balance-leader",
            region,
            region.leader_store_id()?,
            target.id,
            OpKind::BALANCE,
        ))
    }
}

impl Scheduler for BalanceLeaderScheduler {
    fn name(&self) -> &str {
        "balance-leader-scheduler"
    }

    fn scheduler_type(&self) -> &str {
        "balance-leader"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        let limit = cluster
            .config()
            .leader_schedule_limit
            .min(adjust_balance_limit(cluster, ResourceKind::Leader));
        self.limiter.operator_count(OpKind::LEADER) < limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let stores = cluster.get_stores();
        let source = self.selector.select_source(cluster, &stores);
        let target = self.selector.select_target(cluster, &stores, &[]);
        let (source, target) = match (source, target) {
            (Some(s), Some(t)) => (s, t),
            // Once the cluster is balanced every store ends up tainted and
            // the scheduler would stop adapting to sudden changes; clear
            // the cache and start over next tick.
            _ => {
                self.metrics.no_candidate.inc();
                self.taint.clear();
                return Vec::new();
            }
        };
        debug!(
            source = %source.id,
            target = %target.id,
            "balance-leader selected highest and lowest scored stores"
        );

        for _ in 0..BALANCE_LEADER_RETRY_LIMIT {
            if let Some(op) = self.transfer_leader_out(&source, cluster, influence) {
                return vec![op];
            }
            if let Some(op) = self.transfer_leader_in(&target, cluster, influence) {
                return vec![op];
            }
        }

        debug!(
            source = %source.id,
            target = %target.id,
            "no leader operator created, tainting both stores"
        );
        self.taint.put(source.id);
        self.taint.put(target.id);
        Vec::new()
    }
}
