//! Spreading the peers of newly created regions across the cluster.

use std::collections::HashSet;

use tracing::debug;

use steward_model::{Peer, Region, ResourceKind, Store, StoreId};

use crate::cluster::Cluster;
use crate::filter::{
    filter_target, DistinctScoreFilter, Filter, HealthFilter, PendingPeerCountFilter,
    SnapshotCountFilter, StateFilter, StorageThresholdFilter,
};
use crate::operator::{OpKind, Operator, Step};

/// Rebuilds fresh regions' peer sets so no store accumulates a
/// disproportionate share of them.
///
/// The scatterer remembers which stores it has already used; a region peer
/// may keep its store only if that store has not been used since the last
/// reset. When every store has been used the memory resets, which yields an
/// exactly uniform distribution whenever the peer total divides evenly by
/// the store count.
pub struct RegionScatterer {
    selected: HashSet<StoreId>,
}

impl RegionScatterer {
    /// A scatterer with empty memory.
    pub fn new() -> Self {
        Self {
            selected: HashSet::new(),
        }
    }

    /// Proposes redistributing the region's peers; None when the current
    /// placement already fits.
    pub fn scatter(&mut self, cluster: &dyn Cluster, region: &Region) -> Option<Operator> {
        if region.peers.len() != cluster.config().max_replicas {
            return None;
        }
        if cluster.is_region_hot(region.id) {
            debug!(region_id = %region.id, "not scattering hot region");
            return None;
        }
        let leader_store = region.leader_store_id()?;

        let mut available = self.collect_available_stores(cluster, region);
        let mut target_peers: Vec<Peer> = Vec::new();
        let mut replaced: Vec<(StoreId, Peer)> = Vec::new();
        for peer in &region.peers {
            if available.is_empty() {
                self.selected.clear();
                available = self.collect_available_stores(cluster, region);
            }
            if self.selected.insert(peer.store_id) {
                available.retain(|s| s.id != peer.store_id);
                target_peers.push(*peer);
                continue;
            }
            let new_peer = match self.select_replacement(cluster, region, *peer, &available) {
                Some(p) => p,
                None => {
                    target_peers.push(*peer);
                    continue;
                }
            };
            available.retain(|s| s.id != new_peer.store_id);
            self.selected.insert(new_peer.store_id);
            replaced.push((peer.store_id, new_peer));
            target_peers.push(new_peer);
        }

        if replaced.is_empty() {
            return None;
        }

        let mut steps: Vec<Step> = replaced
            .iter()
            .map(|(_, new_peer)| Step::AddPeer {
                to_store: new_peer.store_id,
                peer_id: new_peer.id,
            })
            .collect();
        let mut kind = OpKind::ADMIN | OpKind::REGION;
        if replaced.iter().any(|(old, _)| *old == leader_store) {
            let new_leader = target_peers.iter().find(|p| p.store_id != leader_store)?;
            steps.push(Step::TransferLeader {
                from_store: leader_store,
                to_store: new_leader.store_id,
            });
            kind = kind | OpKind::LEADER;
        }
        steps.extend(replaced.iter().map(|(old, _)| Step::RemovePeer { from_store: *old }));
        Some(Operator::new("scatter-region", region.id, kind, steps))
    }

    fn collect_available_stores(&self, cluster: &dyn Cluster, region: &Region) -> Vec<Store> {
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(StateFilter),
            Box::new(HealthFilter),
            Box::new(SnapshotCountFilter),
            Box::new(StorageThresholdFilter),
            Box::new(PendingPeerCountFilter),
        ];
        let region_stores: HashSet<StoreId> = region.store_ids().into_iter().collect();
        let mut stores: Vec<Store> = cluster
            .get_stores()
            .into_iter()
            .filter(|s| !self.selected.contains(&s.id))
            .filter(|s| !region_stores.contains(&s.id))
            .filter(|s| !filter_target(cluster, s, &filters))
            .collect();
        stores.sort_by_key(|s| s.id);
        stores
    }

    fn select_replacement(
        &self,
        cluster: &dyn Cluster,
        region: &Region,
        old_peer: Peer,
        available: &[Store],
    ) -> Option<Peer> {
        let source = cluster.get_store(old_peer.store_id)?;
        let guard = DistinctScoreFilter::new(
            cluster.config().location_labels.clone(),
            cluster.get_region_stores(region),
            &source,
        );
        let mut best: Option<&Store> = None;
        for store in available {
            if guard.filter_target(cluster, store) {
                continue;
            }
            let better = match best {
                None => true,
                Some(held) => {
                    store.resource_score(ResourceKind::Region, 0)
                        < held.resource_score(ResourceKind::Region, 0)
                }
            };
            if better {
                best = Some(store);
            }
        }
        cluster.alloc_peer(best?.id)
    }
}

impl Default for RegionScatterer {
    fn default() -> Self {
        Self::new()
    }
}
