//! Name-indexed scheduler construction.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use steward_schedule::OperatorLimiter;

use crate::adjacent_region::AdjacentRegionScheduler;
use crate::balance_leader::BalanceLeaderScheduler;
use crate::balance_region::BalanceRegionScheduler;
use crate::base::Scheduler;
use crate::evict_leader::EvictLeaderScheduler;
use crate::grant_leader::GrantLeaderScheduler;
use crate::hot_region::BalanceHotRegionsScheduler;
use crate::label::LabelScheduler;
use crate::random_merge::RandomMergeScheduler;
use crate::scatter_range::ScatterRangeScheduler;
use crate::shuffle_leader::ShuffleLeaderScheduler;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors reported synchronously to the registry caller. Nothing is
/// registered or constructed when one is returned.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No factory is registered under the requested name.
    #[error("unknown scheduler {0:?}")]
    UnknownScheduler(String),

    /// The factory rejected its arguments.
    #[error("invalid scheduler arguments: {0}")]
    InvalidArgs(String),
}

/// A scheduler constructor: limiter plus string arguments in, scheduler out.
pub type SchedulerFactory =
    fn(Arc<OperatorLimiter>, &[String]) -> Result<Box<dyn Scheduler>>;

/// Central name → factory table, populated once at program start.
pub struct SchedulerRegistry {
    table: BTreeMap<&'static str, SchedulerFactory>,
}

impl SchedulerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// A registry holding every built-in scheduler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("balance-leader", |limiter, _args| {
            Ok(Box::new(BalanceLeaderScheduler::new(limiter)))
        });
        registry.register("balance-region", |limiter, _args| {
            Ok(Box::new(BalanceRegionScheduler::new(limiter)))
        });
        registry.register("hot-read-region", |limiter, _args| {
            Ok(Box::new(BalanceHotRegionsScheduler::read(limiter)))
        });
        registry.register("hot-write-region", |limiter, _args| {
            Ok(Box::new(BalanceHotRegionsScheduler::write(limiter)))
        });
        registry.register("shuffle-leader", |limiter, _args| {
            Ok(Box::new(ShuffleLeaderScheduler::new(limiter)))
        });
        registry.register("adjacent-region", |limiter, _args| {
            Ok(Box::new(AdjacentRegionScheduler::new(limiter)))
        });
        registry.register("label", |limiter, _args| {
            Ok(Box::new(LabelScheduler::new(limiter)))
        });
        registry.register("scatter-range", |limiter, args| {
            Ok(Box::new(ScatterRangeScheduler::from_args(limiter, args)?))
        });
        registry.register("random-merge", |limiter, _args| {
            Ok(Box::new(RandomMergeScheduler::new(limiter)))
        });
        registry.register("evict-leader", |limiter, args| {
            Ok(Box::new(EvictLeaderScheduler::from_args(limiter, args)?))
        });
        registry.register("grant-leader", |limiter, args| {
            Ok(Box::new(GrantLeaderScheduler::from_args(limiter, args)?))
        });
        registry
    }

    /// Adds or replaces a factory under `name`.
    pub fn register(&mut self, name: &'static str, factory: SchedulerFactory) {
        self.table.insert(name, factory);
    }

    /// Constructs a scheduler by registered name.
    pub fn create(
        &self,
        name: &str,
        limiter: Arc<OperatorLimiter>,
        args: &[String],
    ) -> Result<Box<dyn Scheduler>> {
        let factory = self
            .table
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownScheduler(name.to_string()))?;
        factory(limiter, args)
    }

    /// Every registered name, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.table.keys().copied().collect()
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
