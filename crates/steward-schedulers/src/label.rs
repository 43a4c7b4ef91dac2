//! Enforces the reject-leader label: leaders found on labelled stores are
//! moved away.

use std::sync::Arc;

use tracing::debug;

use steward_model::ResourceKind;
use steward_schedule::filter::{Filter, HealthFilter, RejectLeaderFilter, StateFilter};
use steward_schedule::operator::{transfer_leader_operator, OpKind};
use steward_schedule::selector::BalanceSelector;
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics};

use crate::base::Scheduler;

/// Walks stores matching the configured reject-leader labels and evicts one
/// leader per tick.
pub struct LabelScheduler {
    limiter: Arc<OperatorLimiter>,
    selector: BalanceSelector,
    metrics: SchedulerMetrics,
}

impl LabelScheduler {
    /// A scheduler with the leader target pipeline.
    pub fn new(limiter: Arc<OperatorLimiter>) -> Self {
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(StateFilter),
            Box::new(HealthFilter),
            Box::new(RejectLeaderFilter),
        ];
        Self {
            limiter,
            selector: BalanceSelector::new(ResourceKind::Leader, filters),
            metrics: SchedulerMetrics::new(),
        }
    }
}

impl Scheduler for LabelScheduler {
    fn name(&self) -> &str {
        "label-scheduler"
    }

    fn scheduler_type(&self) -> &str {
        "label"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        self.limiter.operator_count(OpKind::LEADER) < cluster.config().leader_schedule_limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, _influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let mut stores = cluster.get_stores();
        stores.sort_by_key(|s| s.id);
        for store in stores {
            if !cluster.check_reject_leader_label(&store) {
                continue;
            }
            let region = match cluster.rand_leader_region(store.id) {
                Some(r) => r,
                None => continue,
            };
            debug!(store_id = %store.id, region_id = %region.id, "label store still holds a leader");
            let followers = cluster.get_follower_stores(&region);
            let target = match self.selector.select_target(cluster, &followers, &[]) {
                Some(t) => t,
                None => continue,
            };
            self.metrics.new_operator.inc();
            return vec![transfer_leader_operator(
                "label-reject-leader",
                &region,
                store.id,
                target.id,
                OpKind::empty(),
            )];
        }
        self.metrics.no_candidate.inc();
        Vec::new()
    }
}
