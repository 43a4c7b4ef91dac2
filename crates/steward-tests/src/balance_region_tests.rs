#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use steward_model::StoreId;
    use steward_schedule::{OpInfluence, OpKind, OperatorLimiter};
    use steward_schedulers::{BalanceRegionScheduler, Scheduler};

    use crate::check_transfer_peer;
    use crate::mock_cluster::MockCluster;

    fn new_scheduler() -> BalanceRegionScheduler {
        BalanceRegionScheduler::new(Arc::new(OperatorLimiter::new()))
    }

    #[test]
    fn single_replica_regions_follow_the_scores() {
        let mut tc = MockCluster::new();
        tc.config.max_replicas = 1;
        tc.add_region_store(1, 6);
        tc.add_region_store(2, 8);
        tc.add_region_store(3, 8);
        tc.add_region_store(4, 16);
        tc.add_leader_region(1, 4, &[]);

        let mut sb = new_scheduler();
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 4, 1);
        assert_eq!(sb.metrics().new_operator.get(), 1);

        // An offline store is no longer a valid target; store 2 takes over
        // as the lightest.
        tc.set_store_offline(1);
        tc.update_region_count(2, 6);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 4, 2);

        // With three required replicas the single-replica region is the
        // replica checker's business, not this scheduler's.
        tc.config.max_replicas = 3;
        assert!(sb.schedule(&tc, &OpInfluence::empty()).is_empty());

        sb.taint_cache().clear();
        tc.config.max_replicas = 1;
        assert!(!sb.schedule(&tc, &OpInfluence::empty()).is_empty());
    }

    #[test]
    fn three_replica_topology_chain() {
        let mut tc = MockCluster::new();
        tc.config.max_replicas = 3;
        tc.config.location_labels =
            vec!["zone".to_string(), "rack".to_string(), "host".to_string()];

        // Store 1 has the largest region score, so the balancer tries to
        // move its peer of region 1 first.
        tc.add_labels_store(1, 16, &[("zone", "z1"), ("rack", "r1"), ("host", "h1")]);
        tc.add_labels_store(2, 15, &[("zone", "z1"), ("rack", "r2"), ("host", "h1")]);
        tc.add_labels_store(3, 14, &[("zone", "z1"), ("rack", "r2"), ("host", "h2")]);
        tc.add_leader_region(1, 1, &[2, 3]);

        let mut sb = new_scheduler();
        // No other store can take the peer; store 1 lands in the taint
        // cache and is skipped next tick.
        assert!(sb.schedule(&tc, &OpInfluence::empty()).is_empty());
        assert!(sb.taint_cache().contains(StoreId::new(1)));

        // Store 4 can relieve store 2 without hurting diversity.
        tc.add_labels_store(4, 2, &[("zone", "z1"), ("rack", "r2"), ("host", "h1")]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 2, 4);

        // Store 5 matches store 1's diversity contribution exactly.
        tc.add_labels_store(5, 2, &[("zone", "z1"), ("rack", "r1"), ("host", "h1")]);
        sb.taint_cache().remove(StoreId::new(1));
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 1, 5);

        // Store 6 ties with store 5 on diversity but is lighter.
        tc.add_labels_store(6, 1, &[("zone", "z1"), ("rack", "r1"), ("host", "h1")]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 1, 6);

        // Store 7 is lighter still.
        tc.add_labels_store(7, 0, &[("zone", "z1"), ("rack", "r1"), ("host", "h2")]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 1, 7);

        // A down store drops out of the candidate set.
        tc.set_store_down(7);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 1, 6);

        // Store 8 is light but would reduce the distinct score.
        tc.add_labels_store(8, 1, &[("zone", "z1"), ("rack", "r2"), ("host", "h3")]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 1, 6);

        // With every usable candidate down the tick fails and taints.
        tc.set_store_down(4);
        tc.set_store_down(5);
        tc.set_store_down(6);
        assert!(sb.schedule(&tc, &OpInfluence::empty()).is_empty());
        assert!(sb.taint_cache().contains(StoreId::new(1)));
        sb.taint_cache().remove(StoreId::new(1));

        // Store 9 out-scores store 1 and becomes the source, but it hosts
        // no regions to move.
        tc.add_labels_store(9, 20, &[("zone", "z2"), ("rack", "r1"), ("host", "h1")]);
        assert!(sb.schedule(&tc, &OpInfluence::empty()).is_empty());
    }

    #[test]
    fn five_replica_topology_chain() {
        let mut tc = MockCluster::new();
        tc.config.max_replicas = 5;
        tc.config.location_labels =
            vec!["zone".to_string(), "rack".to_string(), "host".to_string()];

        tc.add_labels_store(1, 4, &[("zone", "z1"), ("rack", "r1"), ("host", "h1")]);
        tc.add_labels_store(2, 5, &[("zone", "z2"), ("rack", "r1"), ("host", "h1")]);
        tc.add_labels_store(3, 6, &[("zone", "z3"), ("rack", "r1"), ("host", "h1")]);
        tc.add_labels_store(4, 7, &[("zone", "z4"), ("rack", "r1"), ("host", "h1")]);
        tc.add_labels_store(5, 28, &[("zone", "z5"), ("rack", "r1"), ("host", "h1")]);
        tc.add_leader_region(1, 1, &[2, 3, 4, 5]);

        let mut sb = new_scheduler();

        // Store 6 shares store 5's location, so the move is diversity
        // neutral and the score decides.
        tc.add_labels_store(6, 1, &[("zone", "z5"), ("rack", "r2"), ("host", "h1")]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 5, 6);

        // Store 7 ties store 6 on diversity but carries more data.
        tc.add_labels_store(7, 5, &[("zone", "z6"), ("rack", "r1"), ("host", "h1")]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 5, 6);

        // With store 6 inside the region, store 1 offers both a lighter
        // score and higher diversity than keeping the peer on store 5.
        tc.add_leader_region(1, 2, &[3, 4, 5, 6]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 5, 1);

        // Store 11 becomes the heaviest; store 6 is the best relief.
        tc.add_labels_store(11, 29, &[("zone", "z1"), ("rack", "r2"), ("host", "h1")]);
        tc.add_labels_store(12, 8, &[("zone", "z2"), ("rack", "r2"), ("host", "h1")]);
        tc.add_labels_store(13, 7, &[("zone", "z3"), ("rack", "r2"), ("host", "h1")]);
        tc.add_leader_region(1, 2, &[3, 11, 12, 13]);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 11, 6);
    }

    #[test]
    fn region_weights_skew_the_scores() {
        let mut tc = MockCluster::new();
        tc.config.max_replicas = 1;
        for id in 1..=4 {
            tc.add_region_store(id, 10);
        }
        tc.update_store_region_weight(1, 0.5);
        tc.update_store_region_weight(2, 0.9);
        tc.update_store_region_weight(3, 1.0);
        tc.update_store_region_weight(4, 2.0);
        tc.add_leader_region(1, 1, &[]);

        let mut sb = new_scheduler();
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 1, 4);

        tc.update_region_count(4, 30);
        let ops = sb.schedule(&tc, &OpInfluence::empty());
        check_transfer_peer(&ops[0], OpKind::BALANCE, 1, 3);
    }
}
