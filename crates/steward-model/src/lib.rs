#![warn(missing_docs)]

//! Steward cluster data model: stores, regions, peers, and the identifiers
//! shared by every scheduling component.

pub mod region;
pub mod store;
pub mod types;

pub use region::{DownPeer, Peer, Region};
pub use store::{Store, StoreState};
pub use types::{FlowKind, PeerId, RegionId, ResourceKind, StoreId};
