#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use steward_schedule::{OpInfluence, OpKind, OperatorLimiter};
    use steward_schedulers::{BalanceLeaderScheduler, Scheduler};

    use crate::mock_cluster::MockCluster;
    use crate::check_transfer_leader;

    fn new_scheduler() -> BalanceLeaderScheduler {
        BalanceLeaderScheduler::new(Arc::new(OperatorLimiter::new()))
    }

    #[test]
    fn small_imbalance_is_tolerated() {
        // Stores:     1    2    3    4
        // Leaders:    1    0    0    0
        // Region1:    L    F    F    F
        let tc = MockCluster::new();
        tc.add_leader_store(1, 1);
        tc.add_leader_store(2, 0);
        tc.add_leader_store(3, 0);
        tc.add_leader_store(4, 0);
        tc.add_leader_region(1, 1, &[2, 3, 4]);

        let mut lb = new_scheduler();
        assert!(lb.schedule(&tc, &OpInfluence::empty()).is_empty());
        assert_eq!(lb.metrics().schedule.get(), 1);
        assert_eq!(lb.metrics().new_operator.get(), 0);

        // Stores:     1    2    3    4
        // Leaders:    16   0    0    0
        lb.taint_cache().clear();
        tc.update_leader_count(1, 16);
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 1, 2);
        assert_eq!(lb.metrics().new_operator.get(), 1);
    }

    #[test]
    fn pending_operators_count_against_the_source() {
        // Stores:     1    2    3    4
        // Leaders:    7    8    9    14
        // Region1:    F    F    F    L
        let tc = MockCluster::new();
        tc.add_leader_store(1, 7);
        tc.add_leader_store(2, 8);
        tc.add_leader_store(3, 9);
        tc.add_leader_store(4, 14);
        tc.add_leader_region(1, 4, &[1, 2, 3]);

        let mut lb = new_scheduler();
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 4, 1);

        // With the pending transfer counted, store 4 drops to 13 leaders and
        // store 1 rises to 8; a difference of 5 is inside the tolerance at
        // ratio 2.5, so nothing more is scheduled.
        let influence = OpInfluence::from_operators(&ops, &tc);
        assert!(lb.schedule(&tc, &influence).is_empty());
    }

    #[test]
    fn state_and_health_filters_shape_the_target() {
        // Stores:     1    2    3    4
        // Leaders:    1    2    3    16
        // Region1:    F    F    F    L
        let tc = MockCluster::new();
        tc.add_leader_store(1, 1);
        tc.add_leader_store(2, 2);
        tc.add_leader_store(3, 3);
        tc.add_leader_store(4, 16);
        tc.add_leader_region(1, 4, &[1, 2, 3]);

        let mut lb = new_scheduler();
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 4, 1);

        // An offline store still serves, so it stays a valid source.
        tc.set_store_offline(4);
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 4, 1);

        // A down store is filtered; store 2 becomes the lightest target.
        tc.set_store_down(1);
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 4, 2);

        // A busy store is filtered as well.
        tc.set_store_busy(2, true);
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 4, 3);
    }

    #[test]
    fn leader_weights_skew_the_scores() {
        // Stores:     1     2     3     4
        // Leaders:    10    10    10    10
        // Weight:     0.5   0.9   1     2
        // Region1:    L     F     F     F
        let tc = MockCluster::new();
        for id in 1..=4 {
            tc.add_leader_store(id, 10);
        }
        tc.update_store_leader_weight(1, 0.5);
        tc.update_store_leader_weight(2, 0.9);
        tc.update_store_leader_weight(3, 1.0);
        tc.update_store_leader_weight(4, 2.0);
        tc.add_leader_region(1, 1, &[2, 3, 4]);

        let mut lb = new_scheduler();
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 1, 4);

        tc.update_leader_count(4, 30);
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 1, 3);
    }

    #[test]
    fn taint_cache_cycles_until_selection_recovers() {
        // Stores:     1    2    3    4
        // Leaders:    1    2    3    16
        // Region1:    -    F    F    L
        // Region2:    F    F    L    -
        let tc = MockCluster::new();
        tc.add_leader_store(1, 1);
        tc.add_leader_store(2, 2);
        tc.add_leader_store(3, 3);
        tc.add_leader_store(4, 16);
        tc.add_leader_region(1, 4, &[2, 3]);
        tc.add_leader_region(2, 3, &[1, 2]);

        let mut lb = new_scheduler();
        // The scheduler drains the heaviest store first.
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 4, 2);

        // Stores:     1    2    3    4
        // Leaders:    1    14   15   16
        // No follower of region 1 can absorb a leader; the scheduler pulls
        // one into store 1 instead.
        tc.update_leader_count(2, 14);
        tc.update_leader_count(3, 15);
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 3, 1);

        // Stores:     1    2    3    4
        // Leaders:    1    2    15   16
        // Region1:    -    F    L    F
        // Region2:    L    F    F    -
        // No leader on store 4 and no follower on store 1: the tick fails
        // and taints both, then the next tick works with stores 3 and 2.
        tc.add_leader_store(2, 2);
        tc.add_leader_region(1, 3, &[2, 4]);
        tc.add_leader_region(2, 1, &[2, 3]);
        assert!(lb.schedule(&tc, &OpInfluence::empty()).is_empty());
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 3, 2);

        // A balanced cluster taints everything over two idle ticks.
        for id in 1..=4 {
            tc.add_leader_store(id, 10);
        }
        tc.add_leader_region(1, 4, &[2, 3]);
        tc.add_leader_region(2, 1, &[2, 3]);
        assert!(lb.schedule(&tc, &OpInfluence::empty()).is_empty());
        assert!(lb.schedule(&tc, &OpInfluence::empty()).is_empty());

        // Stores:     1    2    3    4
        // Leaders:    11   13   0    16
        // With every store tainted, the first tick clears the cache and the
        // second one schedules again.
        tc.add_leader_store(1, 11);
        tc.add_leader_store(2, 13);
        tc.add_leader_store(3, 0);
        tc.add_leader_store(4, 16);
        assert!(lb.schedule(&tc, &OpInfluence::empty()).is_empty());
        let ops = lb.schedule(&tc, &OpInfluence::empty());
        check_transfer_leader(&ops[0], OpKind::BALANCE, 4, 3);
    }

    #[test]
    fn reject_leader_labels_block_the_target_side() {
        let mut tc = MockCluster::new();
        tc.config.reject_leader_labels = vec![("noleader".to_string(), "true".to_string())];
        tc.add_labels_store(1, 1, &[("noleader", "true")]);
        tc.update_leader_count(1, 1);
        tc.add_leader_store(2, 10);
        tc.add_leader_region(1, 1, &[2]);
        tc.add_leader_region(2, 2, &[1]);

        // The balancer may not move leaders onto the labelled store even
        // though it is by far the lightest.
        let mut lb = new_scheduler();
        assert!(lb.schedule(&tc, &OpInfluence::empty()).is_empty());
    }
}
