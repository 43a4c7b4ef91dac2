//! Replica invariants: count, health, and topology diversity.

use tracing::{debug, warn};

use steward_model::{Peer, Region};

use crate::cluster::Cluster;
use crate::filter::{
    DistinctScoreFilter, ExcludedFilter, Filter, HealthFilter, PendingPeerCountFilter,
    SnapshotCountFilter, StateFilter, StorageThresholdFilter,
};
use crate::operator::{
    add_peer_operator, move_peer_operator, remove_peer_operator, OpKind, Operator,
};
use crate::selector::{distinct_score, ReplicaSelector};

/// Stateless per-region replica repair. Priority order: down peers, offline
/// peers, missing replicas, surplus replicas, topology improvement. Returns
/// at most one operator per call.
pub struct ReplicaChecker<'a> {
    cluster: &'a dyn Cluster,
}

impl<'a> ReplicaChecker<'a> {
    /// A checker over one cluster snapshot.
    pub fn new(cluster: &'a dyn Cluster) -> Self {
        Self { cluster }
    }

    /// Examines one region and proposes the highest-priority repair, if any.
    pub fn check(&self, region: &Region) -> Option<Operator> {
        if let Some(op) = self.check_down_peer(region) {
            return Some(op);
        }
        if let Some(op) = self.check_offline_peer(region) {
            return Some(op);
        }

        let max_replicas = self.cluster.config().max_replicas;
        if region.peers.len() < max_replicas {
            let (peer, _) = self.select_best_peer_to_add(region)?;
            debug!(region_id = %region.id, store_id = %peer.store_id, "making up replica");
            return Some(add_peer_operator(
                "make-up-replica",
                region.id,
                peer,
                OpKind::REPLICA,
            ));
        }
        if region.peers.len() > max_replicas {
            let (peer, _) = self.select_worst_peer(region)?;
            debug!(region_id = %region.id, store_id = %peer.store_id, "removing extra replica");
            return Some(remove_peer_operator(
                "remove-extra-replica",
                self.cluster,
                region,
                peer.store_id,
                OpKind::REPLICA,
            ));
        }
        self.check_best_replacement(region)
    }

    fn check_down_peer(&self, region: &Region) -> Option<Operator> {
        let max_down = self.cluster.config().max_store_down_secs;
        for down in &region.down_peers {
            if down.down_seconds < max_down {
                continue;
            }
            let store = match self.cluster.get_store(down.peer.store_id) {
                Some(s) => s,
                None => continue,
            };
            if store.down_seconds < max_down {
                continue;
            }
            debug!(region_id = %region.id, store_id = %store.id, "removing down replica");
            return Some(remove_peer_operator(
                "remove-down-replica",
                self.cluster,
                region,
                down.peer.store_id,
                OpKind::REPLICA,
            ));
        }
        None
    }

    fn check_offline_peer(&self, region: &Region) -> Option<Operator> {
        for peer in &region.peers {
            let store = match self.cluster.get_store(peer.store_id) {
                Some(s) => s,
                None => {
                    warn!(
                        region_id = %region.id,
                        store_id = %peer.store_id,
                        "region peer on unknown store, waiting for heartbeats to heal"
                    );
                    return None;
                }
            };
            // Down stores are handled through reported down peers; this
            // branch only drains stores that are deliberately leaving.
            if !store.is_offline() {
                continue;
            }
            if region.peers.len() > self.cluster.config().max_replicas {
                return Some(remove_peer_operator(
                    "remove-extra-offline-replica",
                    self.cluster,
                    region,
                    peer.store_id,
                    OpKind::REPLICA,
                ));
            }
            // A pending peer on a dying store cannot finish its snapshot;
            // adding a replacement would stall behind it.
            if region.pending_peer(peer.id).is_some() {
                return Some(remove_peer_operator(
                    "remove-pending-offline-replica",
                    self.cluster,
                    region,
                    peer.store_id,
                    OpKind::REPLICA,
                ));
            }
            let (new_peer, _) = self.select_best_replacement_peer(region, *peer, Vec::new())?;
            return Some(move_peer_operator(
                "replace-offline-replica",
                self.cluster,
                region,
                OpKind::REPLICA,
                peer.store_id,
                new_peer,
            ));
        }
        None
    }

    fn check_best_replacement(&self, region: &Region) -> Option<Operator> {
        let (old_peer, old_score) = self.select_worst_peer(region)?;
        let (new_peer, new_score) = self.select_best_replacement_peer(region, old_peer, Vec::new())?;
        // Equal-score replacements are refused: without a strict diversity
        // gain they degenerate into untolerated load moves and the region
        // ping-pongs between stores.
        if new_score <= old_score {
            debug!(region_id = %region.id, "no better replica placement");
            return None;
        }
        Some(move_peer_operator(
            "make-better-replica",
            self.cluster,
            region,
            OpKind::REPLICA,
            old_peer.store_id,
            new_peer,
        ))
    }

    /// The best store to receive a new replica of the region, with its
    /// distinct score. Applies the full target pipeline.
    pub fn select_best_peer_to_add(&self, region: &Region) -> Option<(Peer, f64)> {
        self.select_best_store(region, region.store_ids(), Vec::new())
    }

    /// The best store to host a replacement for `old_peer`, scored against
    /// the region without that peer. `extra` lets callers add guards such
    /// as a distinct-score floor.
    pub fn select_best_replacement_peer(
        &self,
        region: &Region,
        old_peer: Peer,
        extra: Vec<Box<dyn Filter>>,
    ) -> Option<(Peer, f64)> {
        let mut without = region.clone();
        without.remove_store_peer(old_peer.store_id);
        // The old store stays excluded even though it no longer hosts a peer
        // of the clipped region.
        self.select_best_store(&without, region.store_ids(), extra)
    }

    fn select_best_store(
        &self,
        region: &Region,
        excluded: Vec<steward_model::StoreId>,
        extra: Vec<Box<dyn Filter>>,
    ) -> Option<(Peer, f64)> {
        let labels = self.cluster.config().location_labels.clone();
        let region_stores = self.cluster.get_region_stores(region);
        let selector = ReplicaSelector::new(
            region_stores.clone(),
            labels.clone(),
            vec![Box::new(HealthFilter), Box::new(SnapshotCountFilter)],
        );
        let mut filters: Vec<Box<dyn Filter>> = vec![
            Box::new(StateFilter),
            Box::new(StorageThresholdFilter),
            Box::new(PendingPeerCountFilter),
            Box::new(ExcludedFilter::targets_only(excluded)),
        ];
        filters.extend(extra);
        let stores = self.cluster.get_stores();
        let target = selector.select_target(self.cluster, &stores, &filters)?;
        let score = distinct_score(&labels, &region_stores, &target);
        let peer = self.cluster.alloc_peer(target.id)?;
        Some((peer, score))
    }

    fn select_worst_peer(&self, region: &Region) -> Option<(Peer, f64)> {
        let labels = self.cluster.config().location_labels.clone();
        let region_stores = self.cluster.get_region_stores(region);
        let selector = ReplicaSelector::new(
            region_stores.clone(),
            labels.clone(),
            vec![Box::new(HealthFilter), Box::new(SnapshotCountFilter)],
        );
        let worst = selector.select_source(self.cluster, &region_stores)?;
        let peer = region.store_peer(worst.id)?;
        Some((peer, distinct_score(&labels, &region_stores, &worst)))
    }

    /// Builds the distinct-score floor used when a scheduler moves the peer
    /// on `old_peer`'s store: any target scoring below the old placement is
    /// rejected.
    pub fn score_guard(&self, region: &Region, old_peer: Peer) -> Option<DistinctScoreFilter> {
        let stores = self.cluster.get_region_stores(region);
        let source = self.cluster.get_store(old_peer.store_id)?;
        Some(DistinctScoreFilter::new(
            self.cluster.config().location_labels.clone(),
            stores,
            &source,
        ))
    }
}
