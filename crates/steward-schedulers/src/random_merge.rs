//! Merges random region pairs; exercises the merge path under load tests.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use steward_schedule::filter::{Filter, HealthFilter, StateFilter};
use steward_schedule::operator::{merge_pair, OpKind};
use steward_schedule::selector::RandomSelector;
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics};

use crate::base::Scheduler;

/// Picks a random leader region and folds it into one of its neighbours.
pub struct RandomMergeScheduler {
    limiter: Arc<OperatorLimiter>,
    selector: RandomSelector,
    rng: StdRng,
    metrics: SchedulerMetrics,
}

impl RandomMergeScheduler {
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

impl Scheduler for RandomMergeScheduler {
    fn name(&self) -> &str {
        "random-merge-scheduler"
    }

    fn scheduler_type(&self) -> &str {
        "random-merge"
    }

    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool {
        self.limiter.operator_count(OpKind::MERGE) < cluster.config().merge_schedule_limit
    }

    fn schedule(&mut self, cluster: &dyn Cluster, _influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let stores = cluster.get_stores();
        let store = match self.selector.select_source(cluster, &stores, &mut self.rng) {
            Some(s) => s,
            None => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        let region = match cluster.rand_leader_region(store.id) {
            Some(r) => r,
            None => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        let (prev, next) = cluster.get_adjacent_regions(&region);
        let target = match (prev, next) {
            (Some(a), Some(b)) => {
                if self.rng.gen_bool(0.5) {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => {
                self.metrics.no_candidate.inc();
                return Vec::new();
            }
        };
        match merge_pair(cluster, &region, &target, OpKind::ADMIN) {
            Some((active, passive)) => {
                self.metrics.new_operator.inc();
                vec![active, passive]
            }
            None => {
                self.metrics.skip.inc();
                Vec::new()
            }
        }
    }
}
