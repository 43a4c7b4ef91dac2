//! The scheduler interface and the balance decision rule shared by every
//! balance-family scheduler.

use steward_model::ResourceKind;
use steward_schedule::{Cluster, OpInfluence, Operator};

/// One placement decision engine. The driver calls each enabled scheduler on
/// a coarse tick; a scheduler returns zero or one operator, or a pair for
/// merges.
pub trait Scheduler: Send {
    /// Unique instance name, e.g. "balance-leader-scheduler".
    fn name(&self) -> &str;

    /// Registry type string, e.g. "balance-leader".
    fn scheduler_type(&self) -> &str;

    /// True when the in-flight operator count leaves room for another.
    fn is_schedule_allowed(&self, cluster: &dyn Cluster) -> bool;

    /// Produces at most one operator (two for paired merges); empty means
    /// the scheduler found nothing worth doing this tick.
    fn schedule(&mut self, cluster: &dyn Cluster, influence: &OpInfluence) -> Vec<Operator>;
}

impl std::fmt::Debug for dyn Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("name", &self.name()).finish()
    }
}

/// Decides whether moving `move_size` from source to target strictly
/// improves weighted balance without overshooting.
///
/// A zero-weight target can never absorb load; a zero-weight source should
/// always be drained. Otherwise the weighted source level after giving up
/// the move must still sit above the weighted target level after receiving
/// it.
pub fn should_balance(
    source_size: i64,
    source_weight: f64,
    target_size: i64,
    target_weight: f64,
    move_size: f64,
) -> bool {
    if target_weight == 0.0 {
        return false;
    }
    if source_weight == 0.0 {
        return true;
    }
    source_size as f64 / source_weight - move_size / source_weight
        > target_size as f64 / target_weight + move_size / target_weight
}

/// The per-tick operator ceiling, derived from the standard deviation of
/// resource counts across Up stores: more imbalance allows more parallel
/// work. Never below one so a balanced cluster can still react.
pub fn adjust_balance_limit(cluster: &dyn Cluster, kind: ResourceKind) -> u64 {
    let counts: Vec<f64> = cluster
        .get_stores()
        .iter()
        .filter(|s| s.is_up())
        .map(|s| s.resource_count(kind) as f64)
        .collect();
    if counts.is_empty() {
        return 1;
    }
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    let variance = counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64;
    (variance.sqrt() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::should_balance;

    #[test]
    fn balance_rule_truth_table() {
        let cases: [(i64, f64, i64, f64, f64, bool); 9] = [
            (100, 1.0, 80, 1.0, 5.0, true),
            (100, 1.0, 80, 1.0, 15.0, false),
            (100, 1.0, 120, 2.0, 10.0, true),
            (100, 1.0, 180, 2.0, 10.0, false),
            (100, 0.5, 180, 1.0, 10.0, false),
            (100, 0.5, 180, 1.0, 5.0, true),
            (100, 1.0, 10, 0.0, 10.0, false),
            (100, 0.0, 10, 0.0, 10.0, false),
            (100, 0.0, 500, 1.0, 50.0, true),
        ];
        for (source_size, source_weight, target_size, target_weight, move_size, expected) in cases {
            assert_eq!(
                should_balance(source_size, source_weight, target_size, target_weight, move_size),
                expected,
                "case ({source_size}, {source_weight}, {target_size}, {target_weight}, {move_size})"
            );
        }
    }
}
