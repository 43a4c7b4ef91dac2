//! Steward scheduling test infrastructure.
//!
//! Provides the in-memory `MockCluster` harness plus step-shape assertion
//! helpers, and hosts the end-to-end scenario suites for the schedulers,
//! checkers, and the region scatterer.

pub mod mock_cluster;

mod balance_leader_tests;
mod balance_region_tests;
mod merge_checker_tests;
mod scatterer_tests;

pub use mock_cluster::MockCluster;

use steward_model::StoreId;
use steward_schedule::{OpKind, Operator, Step};

/// Asserts the operator is a single leader transfer `from → to` carrying
/// `kind` (plus the implied leader flag).
pub fn check_transfer_leader(op: &Operator, kind: OpKind, from: u64, to: u64) {
    assert_eq!(op.len(), 1, "expected a bare leader transfer: {op}");
    assert_eq!(
        op.step(0),
        Some(&Step::TransferLeader {
            from_store: StoreId::new(from),
            to_store: StoreId::new(to),
        }),
        "unexpected transfer step: {op}"
    );
    let want = kind | OpKind::LEADER;
    assert!(op.kind().contains(want), "missing kind flags: {op}");
}

/// Asserts the operator moves a peer `from → to`: an add, an optional
/// leader handoff, and a remove, carrying `kind`.
pub fn check_transfer_peer(op: &Operator, kind: OpKind, from: u64, to: u64) {
    assert!(
        op.len() == 2 || op.len() == 3,
        "expected a move-peer operator: {op}"
    );
    match op.step(0) {
        Some(Step::AddPeer { to_store, .. }) => assert_eq!(to_store.as_u64(), to, "{op}"),
        other => panic!("expected add-peer first, got {other:?}"),
    }
    match op.step(op.len() - 1) {
        Some(Step::RemovePeer { from_store }) => assert_eq!(from_store.as_u64(), from, "{op}"),
        other => panic!("expected remove-peer last, got {other:?}"),
    }
    let want = kind | OpKind::REGION;
    assert!(op.kind().contains(want), "missing kind flags: {op}");
}

/// Asserts the operator moves a peer and hands leadership off on the way.
pub fn check_transfer_peer_with_leader_transfer(op: &Operator, kind: OpKind, from: u64, to: u64) {
    assert_eq!(op.len(), 3, "expected move-peer with leader handoff: {op}");
    check_transfer_peer(op, kind, from, to);
}

/// Asserts the operator adds one peer on `store`.
pub fn check_add_peer(op: &Operator, kind: OpKind, store: u64) {
    assert_eq!(op.len(), 1, "expected a bare add-peer: {op}");
    match op.step(0) {
        Some(Step::AddPeer { to_store, .. }) => assert_eq!(to_store.as_u64(), store, "{op}"),
        other => panic!("expected add-peer, got {other:?}"),
    }
    assert!(op.kind().contains(kind), "missing kind flags: {op}");
}

/// Asserts the operator removes the peer on `store`, allowing a leading
/// leader handoff.
pub fn check_remove_peer(op: &Operator, store: u64) {
    match op.len() {
        1 => match op.step(0) {
            Some(Step::RemovePeer { from_store }) => assert_eq!(from_store.as_u64(), store, "{op}"),
            other => panic!("expected remove-peer, got {other:?}"),
        },
        2 => {
            match op.step(0) {
                Some(Step::TransferLeader { from_store, .. }) => {
                    assert_eq!(from_store.as_u64(), store, "{op}")
                }
                other => panic!("expected leader handoff first, got {other:?}"),
            }
            match op.step(1) {
                Some(Step::RemovePeer { from_store }) => {
                    assert_eq!(from_store.as_u64(), store, "{op}")
                }
                other => panic!("expected remove-peer last, got {other:?}"),
            }
        }
        n => panic!("expected remove-peer operator, got {n} steps: {op}"),
    }
}
