//! Disperses adjacent regions whose leaders sit on the same store.
//!
//! Two neighbouring ranges led from one store make that store a write
//! hotspot for sequential workloads. The scheduler scans regions in key
//! order, remembers where it stopped, and breaks up one such pair per tick.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use steward_model::{Region, ResourceKind, Store, StoreId};
use steward_schedule::filter::{
    filter_target, DistinctScoreFilter, ExcludedFilter, Filter, HealthFilter,
    PendingPeerCountFilter, RejectLeaderFilter, SnapshotCountFilter, StateFilter,
    StorageThresholdFilter,
};
use steward_schedule::operator::{move_peer_operator, transfer_leader_operator, OpKind};
use steward_schedule::{Cluster, OpInfluence, Operator, OperatorLimiter, SchedulerMetrics};

use crate::base::Scheduler;

/// Regions examined per tick.
const SCAN_LIMIT: usize = 1000;

/// Ceiling on concurrent adjacent-region operators.
const ADJACENT_SCHEDULE_LIMIT: u64 = 64;

/// Splits up adjacent same-leader region pairs, preferring the cheap leader
/// transfer and falling back to moving the leader's replica.
pub struct AdjacentRegionScheduler {
    limiter: Arc<OperatorLimiter>,
    last_key: Vec<u8>,
    metrics: SchedulerMetrics,
}

impl AdjacentRegionScheduler {
    /// A scheduler starting its scan at the beginning of the keyspace.
    pub fn new(limiter: Arc<OperatorLimiter>) -> Self {
        Self {
            limiter,
            last_key: Vec::new(),
            metrics: SchedulerMetrics::new(),
        }
    }

    fn disperse(&self, cluster: &dyn Cluster, region: &Region, sibling: &Region) -> Option<Operator> {
        let leader_store = region.leader_store_id()?;
        let stores: HashSet<StoreId> = region.store_ids().into_iter().collect();
        let sibling_stores: HashSet<StoreId> = sibling.store_ids().into_iter().collect();

        if stores != sibling_stores {
            // The peer sets differ, so some follower store is free of the
            // sibling; handing leadership there is enough.
            let mut followers = cluster.get_follower_stores(region);
            followers.sort_by_key(|s| s.id);
            let filters: Vec<Box<dyn Filter>> = vec![
                Box::new(StateFilter),
                Box::new(HealthFilter),
                Box::new(RejectLeaderFilter),
            ];
            let target = followers.into_iter().find(|s| {
                !sibling_stores.contains(&s.id) && !filter_target(cluster, s, &filters)
            })?;
            return Some(transfer_leader_operator(
                "balance-adjacent-region",
                region,
                leader_store,
                target.id,
                OpKind::ADJACENT,
            ));
        }

        // Identical peer sets: every leader position overlaps the sibling,
        // so the leader's replica has to move to a fresh store.
        let source = cluster.get_store(leader_store)?;
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(ExcludedFilter::targets_only(region.store_ids())),
            Box::new(StateFilter),
            Box::new(HealthFilter),
            Box::new(SnapshotCountFilter),
            Box::new(StorageThresholdFilter),
            Box::new(PendingPeerCountFilter),
            Box::new(DistinctScoreFilter::new(
                cluster.config().location_labels.clone(),
                cluster.get_region_stores(region),
                &source,
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
            .min_by(|a, b| {
                a.resource_score(ResourceKind::Region, 0)
                    .total_cmp(&b.resource_score(ResourceKind::Region, 0))
            })?;
        let new_peer = cluster.alloc_peer(target.id)?;
        Some(move_peer_operator(
            "balance-adjacent-region",
            cluster,
            region,
            OpKind::ADJACENT,
            leader_store,
            new_peer,
        ))
    }
}

impl Scheduler for AdjacentRegionScheduler {
    fn name(&self) -> &str {
        "balance-adjacent-region-scheduler"
    }

    fn scheduler_type(&self) -> &str {
        "adjacent-region"
    }

    fn is_schedule_allowed(&self, _cluster: &dyn Cluster) -> bool {
        self.limiter.operator_count(OpKind::ADJACENT) < ADJACENT_SCHEDULE_LIMIT
    }

    fn schedule(&mut self, cluster: &dyn Cluster, _influence: &OpInfluence) -> Vec<Operator> {
        self.metrics.schedule.inc();
        let regions = cluster.scan_regions(&self.last_key, SCAN_LIMIT);
        if regions.len() < 2 {
            self.last_key.clear();
            self.metrics.no_candidate.inc();
            return Vec::new();
        }
        for pair in regions.windows(2) {
            let (region, sibling) = (&pair[0], &pair[1]);
            if region.end_key.is_empty() || region.end_key != sibling.start_key {
                continue;
            }
            let (Some(lead), Some(sibling_lead)) =
                (region.leader_store_id(), sibling.leader_store_id())
            else {
                continue;
            };
            if lead != sibling_lead {
                continue;
            }
            // Resume after this pair next tick even if nothing works now.
            self.last_key = sibling.start_key.clone();
            debug!(
                region_id = %region.id,
                sibling_id = %sibling.id,
                store_id = %lead,
                "adjacent regions share a leader store"
            );
            match self.disperse(cluster, region, sibling) {
                Some(op) => {
                    self.metrics.new_operator.inc();
                    return vec![op];
                }
                None => {
                    self.metrics.skip.inc();
                    return Vec::new();
                }
            }
        }
        self.last_key.clear();
        self.metrics.no_candidate.inc();
        Vec::new()
    }
}
