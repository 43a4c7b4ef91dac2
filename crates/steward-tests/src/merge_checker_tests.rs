#[cfg(test)]
mod tests {
    use steward_model::{Peer, PeerId, Region, RegionId, StoreId};
    use steward_schedule::{Cluster, MergeChecker, Step};

    use crate::mock_cluster::MockCluster;

    fn peer(id: u64, store: u64) -> Peer {
        Peer {
            id: PeerId::new(id),
            store_id: StoreId::new(store),
        }
    }

    fn region(id: u64, start: &str, end: &str, peers: &[(u64, u64)], leader: usize, size: u64) -> Region {
        let mut region = Region::new(RegionId::new(id));
        region.start_key = start.as_bytes().to_vec();
        region.end_key = end.as_bytes().to_vec();
        region.peers = peers.iter().map(|(id, store)| peer(*id, *store)).collect();
        region.leader = Some(region.peers[leader]);
        region.approximate_size = size;
        region
    }

    fn merge_cluster() -> MockCluster {
        let mut tc = MockCluster::new();
        tc.config.max_merge_region_size = 2;
        for id in 1..=6 {
            tc.add_region_store(id, 1);
        }
        tc.put_region(region(1, "", "a", &[(101, 1), (102, 2)], 0, 1));
        tc.put_region(region(
            2,
            "a",
            "t",
            &[(103, 1), (104, 4), (105, 5)],
            1,
            200,
        ));
        tc.put_region(region(3, "t", "x", &[(106, 1), (107, 5), (108, 6)], 2, 1));
        tc.put_region(region(4, "x", "", &[(109, 4)], 0, 10));
        tc
    }

    #[test]
    fn only_small_regions_with_matching_peer_counts_merge() {
        let tc = merge_cluster();
        let mc = MergeChecker::new(&tc);

        // Region 1's only neighbour has a different peer count.
        let r1 = tc.get_region(RegionId::new(1)).unwrap();
        assert!(mc.check(&r1).is_none());

        // Region 2 is too large to merge at all.
        let r2 = tc.get_region(RegionId::new(2)).unwrap();
        assert!(mc.check(&r2).is_none());

        // Region 3 merges into its bigger-but-matching left neighbour.
        let r3 = tc.get_region(RegionId::new(3)).unwrap();
        assert!(mc.check(&r3).is_some());

        // Region 4's only neighbour has three peers to its one.
        let r4 = tc.get_region(RegionId::new(4)).unwrap();
        assert!(mc.check(&r4).is_none());
    }

    #[test]
    fn peers_are_reshaped_to_match_the_target() {
        let tc = merge_cluster();
        let mc = MergeChecker::new(&tc);

        // Partial store overlap, leader outside the shared stores: grow on
        // store 4, hand leadership over, shrink off store 6, then merge.
        let r3 = tc.get_region(RegionId::new(3)).unwrap();
        let (active, passive) = mc.check(&r3).unwrap();
        assert_eq!(
            active.steps(),
            &[
                Step::AddPeer {
                    to_store: StoreId::new(4),
                    peer_id: PeerId::new(1),
                },
                Step::TransferLeader {
                    from_store: StoreId::new(6),
                    to_store: StoreId::new(4),
                },
                Step::RemovePeer {
                    from_store: StoreId::new(6),
                },
                Step::MergeRegion {
                    from_region: RegionId::new(3),
                    to_region: RegionId::new(2),
                    is_passive: false,
                },
            ]
        );
        assert_eq!(
            passive.steps(),
            &[Step::MergeRegion {
                from_region: RegionId::new(3),
                to_region: RegionId::new(2),
                is_passive: true,
            }]
        );

        // Partial overlap including the leader: no leadership step needed.
        let mut r3 = tc.get_region(RegionId::new(3)).unwrap();
        r3.leader = Some(Peer {
            id: PeerId::new(106),
            store_id: StoreId::new(1),
        });
        tc.put_region(r3.clone());
        let (active, passive) = mc.check(&r3).unwrap();
        assert_eq!(
            active.steps(),
            &[
                Step::AddPeer {
                    to_store: StoreId::new(4),
                    peer_id: PeerId::new(2),
                },
                Step::RemovePeer {
                    from_store: StoreId::new(6),
                },
                Step::MergeRegion {
                    from_region: RegionId::new(3),
                    to_region: RegionId::new(2),
                    is_passive: false,
                },
            ]
        );
        assert_eq!(passive.len(), 1);

        // Full store overlap: nothing to reshape.
        let mut r3 = tc.get_region(RegionId::new(3)).unwrap();
        r3.peers = vec![peer(106, 1), peer(107, 5), peer(108, 4)];
        r3.leader = Some(peer(106, 1));
        tc.put_region(r3.clone());
        let (active, _passive) = mc.check(&r3).unwrap();
        assert_eq!(
            active.steps(),
            &[Step::MergeRegion {
                from_region: RegionId::new(3),
                to_region: RegionId::new(2),
                is_passive: false,
            }]
        );
    }

    #[test]
    fn applying_a_merge_pair_leaves_one_contiguous_region() {
        let mut tc = MockCluster::new();
        tc.config.max_merge_region_size = 5;
        for id in 1..=3 {
            tc.add_region_store(id, 1);
        }
        tc.put_region(region(1, "", "m", &[(11, 1), (12, 2), (13, 3)], 0, 4));
        tc.put_region(region(2, "m", "", &[(21, 1), (22, 2), (23, 3)], 0, 3));

        let (active, passive) = {
            let mc = MergeChecker::new(&tc);
            let r2 = tc.get_region(RegionId::new(2)).unwrap();
            mc.check(&r2).unwrap()
        };
        tc.apply_operator(&active);
        tc.apply_operator(&passive);

        assert!(tc.get_region(RegionId::new(2)).is_none());
        let survivor = tc.get_region(RegionId::new(1)).unwrap();
        assert_eq!(survivor.start_key, b"".to_vec());
        assert_eq!(survivor.end_key, b"".to_vec());
        assert_eq!(survivor.approximate_size, 7);
    }

    #[test]
    fn unsettled_regions_do_not_merge() {
        let tc = merge_cluster();
        let mc = MergeChecker::new(&tc);
        let mut r3 = tc.get_region(RegionId::new(3)).unwrap();
        r3.pending_peers = vec![peer(107, 5)];
        assert!(mc.check(&r3).is_none());
    }
}
