//! Region snapshot: a half-open key range and the peers replicating it.

use serde::{Deserialize, Serialize};

use crate::types::{PeerId, RegionId, StoreId};

/// One replica of a region on a specific store
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Replica identifier, unique across the cluster
    pub id: PeerId,
    /// The store hosting this replica
    pub store_id: StoreId,
}

/// A peer that has been unreachable, with how long it has been silent
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownPeer {
    /// The unreachable peer
    pub peer: Peer,
    /// Seconds since the peer last responded
    pub down_seconds: u64,
}

/// A contiguous key range `[start_key, end_key)` replicated as a peer set
/// with exactly one leader. An empty `end_key` means +infinity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Unique region identifier
    pub id: RegionId,
    /// Inclusive start of the key range
    pub start_key: Vec<u8>,
    /// Exclusive end of the key range; empty means the keyspace end
    pub end_key: Vec<u8>,
    /// All replicas of this region
    pub peers: Vec<Peer>,
    /// The peer currently serving reads and coordinating writes
    pub leader: Option<Peer>,
    /// Peers unreachable for at least the failure-detection threshold
    pub down_peers: Vec<DownPeer>,
    /// Peers still receiving their snapshot
    pub pending_peers: Vec<Peer>,
    /// Approximate data size in MiB
    pub approximate_size: u64,
    /// Bytes written during the last region heartbeat interval
    pub written_bytes: u64,
    /// Bytes read during the last region heartbeat interval
    pub read_bytes: u64,
    /// Keys written during the last region heartbeat interval
    pub written_keys: u64,
    /// Keys read during the last region heartbeat interval
    pub read_keys: u64,
}

impl Region {
    /// Creates an empty region covering the whole keyspace
    pub fn new(id: RegionId) -> Self {
        Self {
            id,
            start_key: Vec::new(),
            end_key: Vec::new(),
            peers: Vec::new(),
            leader: None,
            down_peers: Vec::new(),
            pending_peers: Vec::new(),
            approximate_size: 0,
            written_bytes: 0,
            read_bytes: 0,
            written_keys: 0,
            read_keys: 0,
        }
    }

    /// Returns the peer hosted on the given store, if any
    pub fn store_peer(&self, store_id: StoreId) -> Option<Peer> {
        self.peers.iter().copied().find(|p| p.store_id == store_id)
    }

    /// Returns all peers that are not the leader
    pub fn followers(&self) -> Vec<Peer> {
        let leader_id = self.leader.map(|p| p.id);
        self.peers
            .iter()
            .copied()
            .filter(|p| Some(p.id) != leader_id)
            .collect()
    }

    /// Returns the ids of every store holding a peer
    pub fn store_ids(&self) -> Vec<StoreId> {
        self.peers.iter().map(|p| p.store_id).collect()
    }

    /// Returns the store currently holding the leader, if known
    pub fn leader_store_id(&self) -> Option<StoreId> {
        self.leader.map(|p| p.store_id)
    }

    /// Returns the pending peer with the given id, if any
    pub fn pending_peer(&self, peer_id: PeerId) -> Option<Peer> {
        self.pending_peers.iter().copied().find(|p| p.id == peer_id)
    }

    /// Drops the peer hosted on the given store
    pub fn remove_store_peer(&mut self, store_id: StoreId) {
        self.peers.retain(|p| p.store_id != store_id);
        if self.leader.map(|p| p.store_id) == Some(store_id) {
            self.leader = None;
        }
    }

    /// True when `key` falls inside this region's range
    pub fn contains_key(&self, key: &[u8]) -> bool {
        key >= self.start_key.as_slice() && (self.end_key.is_empty() || key < self.end_key.as_slice())
    }
}
