#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use steward_model::RegionId;
    use steward_schedule::{Cluster, RegionScatterer};

    use crate::mock_cluster::MockCluster;

    struct Sequencer {
        max: u64,
        current: u64,
    }

    impl Sequencer {
        fn new(max: u64) -> Self {
            Self { max, current: 0 }
        }

        fn next(&mut self) -> u64 {
            self.current = self.current % self.max + 1;
            self.current
        }
    }

    fn scatter_and_count(num_stores: u64, num_regions: u64) -> HashMap<u64, u64> {
        let tc = MockCluster::new();
        for id in 1..=num_stores {
            tc.add_region_store(id, 0);
        }
        let mut seq = Sequencer::new(num_stores);
        for id in 1..=num_regions {
            let leader = seq.next();
            let followers = [seq.next(), seq.next()];
            tc.add_leader_region(id, leader, &followers);
        }

        let mut scatterer = RegionScatterer::new();
        for id in 1..=num_regions {
            let region = tc.get_region(RegionId::new(id)).unwrap();
            if let Some(op) = scatterer.scatter(&tc, &region) {
                tc.apply_operator(&op);
            }
        }

        let mut counts = HashMap::new();
        for id in 1..=num_regions {
            let region = tc.get_region(RegionId::new(id)).unwrap();
            for peer in &region.peers {
                *counts.entry(peer.store_id.as_u64()).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn six_stores_share_twelve_peers_evenly() {
        let counts = scatter_and_count(6, 4);
        for count in counts.values() {
            assert_eq!(*count, 4 * 3 / 6);
        }
    }

    #[test]
    fn five_stores_share_fifteen_peers_evenly() {
        let counts = scatter_and_count(5, 5);
        for count in counts.values() {
            assert_eq!(*count, 5 * 3 / 5);
        }
    }

    #[test]
    fn stacked_regions_are_spread_out() {
        // Four fresh regions all landed on stores 1-3 of a six-store
        // cluster, as happens when a table is created on one node.
        let tc = MockCluster::new();
        for id in 1..=6 {
            tc.add_region_store(id, 0);
        }
        for id in 1..=4 {
            tc.add_leader_region(id, 1, &[2, 3]);
        }

        let mut scatterer = RegionScatterer::new();
        for id in 1..=4 {
            let region = tc.get_region(RegionId::new(id)).unwrap();
            if let Some(op) = scatterer.scatter(&tc, &region) {
                tc.apply_operator(&op);
            }
        }

        let mut counts: HashMap<u64, u64> = HashMap::new();
        for id in 1..=4 {
            let region = tc.get_region(RegionId::new(id)).unwrap();
            assert!(region.leader.is_some());
            for peer in &region.peers {
                *counts.entry(peer.store_id.as_u64()).or_insert(0) += 1;
            }
        }
        assert_eq!(counts.len(), 6);
        for count in counts.values() {
            assert_eq!(*count, 2);
        }
    }

    #[test]
    fn wrong_replica_count_is_left_alone() {
        let tc = MockCluster::new();
        for id in 1..=4 {
            tc.add_region_store(id, 0);
        }
        tc.add_leader_region(1, 1, &[2]);
        let region = tc.get_region(RegionId::new(1)).unwrap();
        let mut scatterer = RegionScatterer::new();
        assert!(scatterer.scatter(&tc, &region).is_none());
    }
}
