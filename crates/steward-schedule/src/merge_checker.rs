//! Small-region merging with an adjacent sibling.

use tracing::debug;

use steward_model::Region;

use crate::cluster::Cluster;
use crate::operator::{merge_pair, OpKind, Operator};

/// Detects regions small enough to fold into a neighbour and produces the
/// paired active/passive merge operators. The dispatcher must deliver both
/// or neither.
pub struct MergeChecker<'a> {
    cluster: &'a dyn Cluster,
}

impl<'a> MergeChecker<'a> {
    /// A checker over one cluster snapshot.
    pub fn new(cluster: &'a dyn Cluster) -> Self {
        Self { cluster }
    }

    /// Proposes merging `region` into the better of its two neighbours.
    ///
    /// A merge is allowed only when the region is at or below the size
    /// ceiling, is quiet (no down or pending peers), and a neighbour with
    /// the same peer count exists. Of two qualifying neighbours the smaller
    /// one wins.
    pub fn check(&self, region: &Region) -> Option<(Operator, Operator)> {
        let config = self.cluster.config();
        if region.approximate_size > config.max_merge_region_size {
            return None;
        }
        if !region.down_peers.is_empty() || !region.pending_peers.is_empty() {
            debug!(region_id = %region.id, "skip merging unsettled region");
            return None;
        }

        let (prev, next) = self.cluster.get_adjacent_regions(region);
        let target = match (self.qualify(region, prev), self.qualify(region, next)) {
            (Some(a), Some(b)) => {
                if a.approximate_size <= b.approximate_size {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }?;

        debug!(
            region_id = %region.id,
            target_id = %target.id,
            "proposing region merge"
        );
        merge_pair(self.cluster, region, &target, OpKind::empty())
    }

    fn qualify(&self, region: &Region, sibling: Option<Region>) -> Option<Region> {
        let sibling = sibling?;
        if sibling.peers.len() != region.peers.len() {
            return None;
        }
        if !sibling.down_peers.is_empty() || !sibling.pending_peers.is_empty() {
            return None;
        }
        if self.cluster.is_region_hot(sibling.id) {
            return None;
        }
        Some(sibling)
    }
}
