//! Aggregated expected effect of in-flight operators on each store.

use std::collections::HashMap;

use steward_model::StoreId;

use crate::cluster::Cluster;
use crate::operator::{Operator, Step};

/// The delta a store would see if every pending operator completed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StoreInfluence {
    /// Change in leader bytes (MiB)
    pub leader_size: i64,
    /// Change in leader count
    pub leader_count: i64,
    /// Change in region bytes (MiB)
    pub region_size: i64,
    /// Change in region count
    pub region_count: i64,
}

/// Per-store influence summary, computed once per tick from the operator
/// queue and consulted by the balance rule.
#[derive(Clone, Debug, Default)]
pub struct OpInfluence {
    stores: HashMap<StoreId, StoreInfluence>,
}

impl OpInfluence {
    /// An influence with no pending operators.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Walks every step of every operator and accumulates the deltas it
    /// would cause. Regions no longer in the cluster contribute nothing.
    pub fn from_operators(operators: &[Operator], cluster: &dyn Cluster) -> Self {
        let mut influence = Self::default();
        for op in operators {
            let region = match cluster.get_region(op.region_id()) {
                Some(r) => r,
                None => continue,
            };
            let size = region.approximate_size as i64;
            for step in op.steps() {
                match *step {
                    Step::TransferLeader { from_store, to_store } => {
                        let from = influence.entry(from_store);
                        from.leader_size -= size;
                        from.leader_count -= 1;
                        let to = influence.entry(to_store);
                        to.leader_size += size;
                        to.leader_count += 1;
                    }
                    Step::AddPeer { to_store, .. } => {
                        let to = influence.entry(to_store);
                        to.region_size += size;
                        to.region_count += 1;
                    }
                    Step::RemovePeer { from_store } => {
                        let from = influence.entry(from_store);
                        from.region_size -= size;
                        from.region_count -= 1;
                    }
                    Step::MergeRegion { .. } => {}
                }
            }
        }
        influence
    }

    fn entry(&mut self, store_id: StoreId) -> &mut StoreInfluence {
        self.stores.entry(store_id).or_default()
    }

    /// The accumulated delta for one store; zero when nothing is pending.
    pub fn store_influence(&self, store_id: StoreId) -> StoreInfluence {
        self.stores.get(&store_id).copied().unwrap_or_default()
    }
}
