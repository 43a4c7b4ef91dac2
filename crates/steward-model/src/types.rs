use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a unique identifier for a storage node in the cluster
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(u64);

impl StoreId {
    /// Creates a new StoreId from a raw u64 value
    pub fn new(id: u64) -> Self {
        StoreId(id)
    }

    /// Returns the raw u64 value of this store ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a unique identifier for a contiguous key range replicated
/// across stores
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(u64);

impl RegionId {
    /// Creates a new RegionId from a raw u64 value
    pub fn new(id: u64) -> Self {
        RegionId(id)
    }

    /// Returns the raw u64 value of this region ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a unique identifier for one replica of a region
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(u64);

impl PeerId {
    /// Creates a new PeerId from a raw u64 value
    pub fn new(id: u64) -> Self {
        PeerId(id)
    }

    /// Returns the raw u64 value of this peer ID
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The resource a scheduler balances: leaders or region replicas
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Leadership placement (who serves reads and coordinates writes)
    Leader,
    /// Replica placement (where region data lives)
    Region,
}

/// The direction of traffic tracked by the hot-region cache
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowKind {
    /// Bytes served to clients by region leaders
    Read,
    /// Bytes written into region replicas
    Write,
}
