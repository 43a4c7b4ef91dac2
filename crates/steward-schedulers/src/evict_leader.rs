//! Drains all leaders off one store, one transfer per tick.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use steward_model::StoreId;
use steward_schedule::filter::{Filter, HealthFilter, RejectLeaderFilter, StateFilter};
use steward_schedule::operator::{transfer_leader_operator, OpKind};
use steward_schedule::selector::RandomSelector;
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics};

use crate::base::Scheduler;
use crate::registry::SchedulerError;

/// Moves leaders away from a store the operator wants quiet, e.g. ahead of
/// maintenance.
pub struct EvictLeaderScheduler {
    store_id: StoreId,
    name: String,
    limiter: Arc<OperatorLimiter>,
    selector: RandomSelector,
    rng: StdRng,
    metrics: SchedulerMetrics,
}

impl EvictLeaderScheduler {
    /// A scheduler draining the given store.
    pub fn new(limiter: Arc<OperatorLimiter>, store_id: StoreId) -> Self {
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(StateFilter),
            Box::new(HealthFilter),
            Box::new(RejectLeaderFilter),
        ];
        Self {
            store_id,
            name: format!("evict-leader-scheduler-{}", store_id),
            limiter,
            selector: RandomSelector::new(filters),
            rng: StdRng::seed_from_u64(store_id.as_u64()),
            metrics: SchedulerMetrics::new(),
        }
    }

    /// Parses the single `store_id` factory argument.
    pub fn from_args(
        limiter: Arc<OperatorLimiter>,
        args: &[String],
    ) -> Result<Self, SchedulerError> {
        let raw = args
            .first()
            .ok_or_else(|| SchedulerError::InvalidArgs("evict-leader needs a store id".into()))?;
        let id = raw
            .parse::<u64>()
            .map_err(|_| SchedulerError::InvalidArgs(format!("bad store id {raw:?}")))?;
        Ok(Self::new(limiter, StoreId::new(id)))
    }
}

impl Scheduler for EvictLeaderScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheduler_type(&self) -> &str {
        "evict-leader"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        self.limiter.operator_count(OpKind::LEADER) < cluster.config().leader_schedule_limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, _influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let region = match cluster.rand_leader_region(self.store_id) {
            Some(r) => r,
            None => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        let followers = cluster.get_follower_stores(&region);
        let target = match self.selector.select_target(cluster, &followers, &mut self.rng) {
            Some(t) => t,
            None => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        self.metrics.new_operator.inc();
        vec![transfer_leader_operator(
            "evict-leader",
            &region,
            self.store_id,
            target.id,
            OpKind::empty(),
        )]
    }
}
