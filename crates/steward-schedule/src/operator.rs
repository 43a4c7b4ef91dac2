//! Placement operators: ordered step lists with kind flags.
//!
//! An operator is created by a scheduler or checker and handed to the
//! dispatcher, which applies its steps one by one and reports progress back
//! through heartbeats. Operators are immutable once built.

use std::fmt;
use std::ops::BitOr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use steward_model::{Peer, PeerId, Region, RegionId, StoreId};

use crate::cluster::Cluster;

/// One atomic placement change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Hand region leadership from one store to another.
    TransferLeader {
        /// Store currently holding the leader
        from_store: StoreId,
        /// Store that should hold the leader afterwards
        to_store: StoreId,
    },
    /// Create a new replica on a store.
    AddPeer {
        /// Store to create the replica on
        to_store: StoreId,
        /// Pre-allocated id for the new replica
        peer_id: PeerId,
    },
    /// Delete the replica hosted on a store.
    RemovePeer {
        /// Store whose replica is removed
        from_store: StoreId,
    },
    /// Fold one region into its neighbour. Emitted in pairs: the active
    /// side on the disappearing region, the passive side on the survivor.
    MergeRegion {
        /// The region being folded away
        from_region: RegionId,
        /// The region absorbing the range
        to_region: RegionId,
        /// True on the surviving region's operator
        is_passive: bool,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::TransferLeader { from_store, to_store } => {
                write!(f, "transfer leader from store {} to store {}", from_store, to_store)
            }
            Step::AddPeer { to_store, peer_id } => {
                write!(f, "add peer {} on store {}", peer_id, to_store)
            }
            Step::RemovePeer { from_store } => write!(f, "remove peer on store {}", from_store),
            Step::MergeRegion { from_region, to_region, is_passive } => write!(
                f,
                "merge region {} into region {} (passive: {})",
                from_region, to_region, is_passive
            ),
        }
    }
}

/// Bitmask classifying an operator for counting and limiting.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpKind(u16);

impl OpKind {
    /// Moves leadership.
    pub const LEADER: OpKind = OpKind(1);
    /// Moves region data.
    pub const REGION: OpKind = OpKind(1 << 1);
    /// Repairs the replica set.
    pub const REPLICA: OpKind = OpKind(1 << 2);
    /// Initiated by a balance scheduler.
    pub const BALANCE: OpKind = OpKind(1 << 3);
    /// Initiated by a hot-region scheduler.
    pub const HOT_REGION: OpKind = OpKind(1 << 4);
    /// Initiated by an admin-grade scheduler.
    pub const ADMIN: OpKind = OpKind(1 << 5);
    /// Initiated by the adjacent-region scheduler.
    pub const ADJACENT: OpKind = OpKind(1 << 6);
    /// Part of a region merge.
    pub const MERGE: OpKind = OpKind(1 << 7);

    /// Number of distinct flags.
    pub const FLAG_COUNT: usize = 8;

    /// An empty mask.
    pub fn empty() -> OpKind {
        OpKind(0)
    }

    /// True when every flag in `other` is also set in `self`.
    pub fn contains(self, other: OpKind) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when `self` and `other` share at least one flag.
    pub fn intersects(self, other: OpKind) -> bool {
        self.0 & other.0 != 0
    }

    /// The raw bitmask.
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Iterates the individual flags set in this mask.
    pub fn flags(self) -> impl Iterator<Item = usize> {
        (0..Self::FLAG_COUNT).filter(move |bit| self.0 & (1 << bit) != 0)
    }
}

impl BitOr for OpKind {
    type Output = OpKind;

    fn bitor(self, rhs: OpKind) -> OpKind {
        OpKind(self.0 | rhs.0)
    }
}

/// An immutable ordered list of steps applied to one region.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operator {
    desc: String,
    region_id: RegionId,
    kind: OpKind,
    steps: Vec<Step>,
    created_at_ms: u64,
}

impl Operator {
    /// Builds an operator from its parts; the step list must be non-empty.
    pub fn new(desc: &str, region_id: RegionId, kind: OpKind, steps: Vec<Step>) -> Self {
        debug!(%region_id, desc, steps = steps.len(), "new operator");
        Self {
            desc: desc.to_string(),
            region_id,
            kind,
            steps,
            created_at_ms: epoch_millis(),
        }
    }

    /// Short human-readable origin tag, e.g. "balance-leader".
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// The region this operator acts on.
    pub fn region_id(&self) -> RegionId {
        self.region_id
    }

    /// Kind flags for counting and limiting.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the operator carries no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step at `index`, if in range.
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// All steps in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Milliseconds since the epoch at which this operator was created;
    /// the dispatcher uses it to enforce per-step time budgets.
    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on region {}: ", self.desc, self.region_id)?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A plain leader handoff.
pub fn transfer_leader_operator(
    desc: &str,
    region: &Region,
    from: StoreId,
    to: StoreId,
    kind: OpKind,
) -> Operator {
    let step = Step::TransferLeader { from_store: from, to_store: to };
    Operator::new(desc, region.id, kind | OpKind::LEADER, vec![step])
}

/// Adds one replica to a region.
pub fn add_peer_operator(
    desc: &str,
    region_id: RegionId,
    peer: Peer,
    kind: OpKind,
) -> Operator {
    let step = Step::AddPeer { to_store: peer.store_id, peer_id: peer.id };
    Operator::new(desc, region_id, kind | OpKind::REGION, vec![step])
}

/// Steps that drop the peer on `store_id`, handing leadership to a follower
/// first when the leader is the one leaving. Returns the extra kind flags.
fn remove_peer_steps(cluster: &dyn Cluster, region: &Region, store_id: StoreId) -> (OpKind, Vec<Step>) {
    let mut kind = OpKind::REGION;
    let mut steps = Vec::new();
    if region.leader_store_id() == Some(store_id) {
        for follower in region.followers() {
            let store = match cluster.get_store(follower.store_id) {
                Some(s) => s,
                None => continue,
            };
            if cluster.check_reject_leader_label(&store) {
                continue;
            }
            steps.push(Step::TransferLeader { from_store: store_id, to_store: follower.store_id });
            kind = kind | OpKind::LEADER;
            break;
        }
    }
    steps.push(Step::RemovePeer { from_store: store_id });
    (kind, steps)
}

/// Removes one replica, with a leader handoff first if needed.
pub fn remove_peer_operator(
    desc: &str,
    cluster: &dyn Cluster,
    region: &Region,
    store_id: StoreId,
    kind: OpKind,
) -> Operator {
    let (remove_kind, steps) = remove_peer_steps(cluster, region, store_id);
    Operator::new(desc, region.id, kind | remove_kind, steps)
}

/// Moves one replica from `old_store` to a freshly allocated peer on
/// `new_peer.store_id`: add, hand off leadership if needed, remove.
pub fn move_peer_operator(
    desc: &str,
    cluster: &dyn Cluster,
    region: &Region,
    kind: OpKind,
    old_store: StoreId,
    new_peer: Peer,
) -> Operator {
    let (remove_kind, remove_steps) = remove_peer_steps(cluster, region, old_store);
    let mut steps = vec![Step::AddPeer { to_store: new_peer.store_id, peer_id: new_peer.id }];
    steps.extend(remove_steps);
    Operator::new(desc, region.id, kind | remove_kind, steps)
}

/// Builds the paired merge operators folding `region` into `target`.
///
/// The active operator first reshapes the region's peer set to match the
/// target's stores: a peer is added for every target store not already
/// hosting one, leadership is handed to the first added store when the
/// current leader store is not shared with the target, and peers on stores
/// outside the target set are removed. Returns None when the peer counts
/// differ or a peer id cannot be allocated.
pub fn merge_pair(
    cluster: &dyn Cluster,
    region: &Region,
    target: &Region,
    kind: OpKind,
) -> Option<(Operator, Operator)> {
    if region.peers.len() != target.peers.len() {
        return None;
    }
    let leader_store = region.leader_store_id()?;
    let target_stores = target.store_ids();
    let mut leader_settled = target_stores.contains(&leader_store);

    let mut steps = Vec::new();
    let mut op_kind = kind | OpKind::MERGE;
    for store_id in &target_stores {
        if region.store_peer(*store_id).is_some() {
            continue;
        }
        let peer = cluster.alloc_peer(*store_id)?;
        steps.push(Step::AddPeer { to_store: peer.store_id, peer_id: peer.id });
        if !leader_settled {
            steps.push(Step::TransferLeader { from_store: leader_store, to_store: *store_id });
            op_kind = op_kind | OpKind::LEADER;
            leader_settled = true;
        }
    }
    for peer in &region.peers {
        if !target_stores.contains(&peer.store_id) {
            steps.push(Step::RemovePeer { from_store: peer.store_id });
        }
    }
    steps.push(Step::MergeRegion {
        from_region: region.id,
        to_region: target.id,
        is_passive: false,
    });

    let active = Operator::new("merge-region", region.id, op_kind, steps);
    let passive = Operator::new(
        "merge-region",
        target.id,
        kind | OpKind::MERGE,
        vec![Step::MergeRegion {
            from_region: region.id,
            to_region: target.id,
            is_passive: true,
        }],
    );
    Some((active, passive))
}
