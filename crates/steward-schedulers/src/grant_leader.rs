//! Pulls all possible leaders onto one store, one transfer per tick.

use std::sync::Arc;

use steward_model::StoreId;
use steward_schedule::operator::{transfer_leader_operator, OpKind};
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics};

use crate::base::Scheduler;
use crate::registry::SchedulerError;

/// Concentrates leadership on a store the operator wants loaded, the
/// mirror image of leader eviction.
pub struct GrantLeaderScheduler {
    store_id: StoreId,
    name: String,
    limiter: Arc<OperatorLimiter>,
    metrics: SchedulerMetrics,
}

impl GrantLeaderScheduler {
    /// A scheduler granting leaders to the given store.
    pub fn new(limiter: Arc<OperatorLimiter>, store_id: StoreId) -> Self {
        Self {
            store_id,
            name: format!("grant-leader-scheduler-{}", store_id),
            limiter,
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
            .ok_or_else(|| SchedulerError::InvalidArgs("grant-leader needs a store id".into()))?;
        let id = raw
            .parse::<u64>()
            .map_err(|_| SchedulerError::InvalidArgs(format!("bad store id {raw:?}")))?;
        Ok(Self::new(limiter, StoreId::new(id)))
    }
}

impl Scheduler for GrantLeaderScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn scheduler_type(&self) -> &str {
        "grant-leader"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        self.limiter.operator_count(OpKind::LEADER) < cluster.config().leader_schedule_limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, _influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let store = match cluster.get_store(self.store_id) {
            Some(s) if s.is_up() && !s.busy => s,
            _ => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        let region = match cluster.rand_follower_region(store.id) {
            Some(r) => r,
            None => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        let source = match region.leader_store_id() {
            Some(s) => s,
            None => return Vec::new(),
        };
        self.metrics.new_operator.inc();
        vec![transfer_leader_operator(
            "grant-leader",
            &region,
            source,
            store.id,
            OpKind::empty(),
        )]
    }
}
