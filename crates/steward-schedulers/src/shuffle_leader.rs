//! Randomly shuffles leaders between stores; useful for chaos-style testing
//! of leadership churn.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use steward_model::ResourceKind;
use steward_schedule::filter::{Filter, HealthFilter, StateFilter};
use steward_schedule::operator::{transfer_leader_operator, OpKind};
use steward_schedule::selector::RandomSelector;
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics};

use crate::base::{adjust_balance_limit, Scheduler};

/// Picks a random eligible store and moves some leader onto it.
pub struct ShuffleLeaderScheduler {
    limiter: Arc<OperatorLimiter>,
    selector: RandomSelector,
    rng: StdRng,
    metrics: SchedulerMetrics,
}

impl ShuffleLeaderScheduler {
    /// A scheduler seeded from entropy.
    pub fn new(limiter: Arc<OperatorLimiter>) -> Self {
        Self::with_seed(limiter, rand::random())
    }

    /// A scheduler with a fixed seed, for reproducible runs.
    pub fn with_seed(limiter: Arc<OperatorLimiter>, seed: u64) -> Self {
        let filters: Vec<Box<dyn Filter>> = vec![Box::new(StateFilter), Box::new(HealthFilter)];
        Self {
            limiter,
            selector: RandomSelector::new(filters),
            rng: StdRng::seed_from_u64(seed),
            metrics: SchedulerMetrics::new(),
        }
    }
}

impl Scheduler for ShuffleLeaderScheduler {
    fn name(&self) -> &str {
        "shuffle-leader-scheduler"
    }

    fn scheduler_type(&self) -> &str {
        "shuffle-leader"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        let limit = cluster
            .config()
            .leader_schedule_limit
            .min(adjust_balance_limit(cluster, ResourceKind::Leader));
        self.limiter.operator_count(OpKind::LEADER) < limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, _influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let stores = cluster.get_stores();
        let target = match self.selector.select_target(cluster, &stores, &mut self.rng) {
            Some(t) => t,
            None => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        let region = match cluster.rand_follower_region(target.id) {
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
            "shuffle-leader",
            &region,
            source,
            target.id,
            OpKind::ADMIN,
        )]
    }
}
