#![warn(missing_docs)]

//! The steward scheduler family: balance, hot-region, repair-adjacent, and
//! admin schedulers, plus the registry that constructs them by name.

pub mod adjacent_region;
pub mod balance_leader;
pub mod balance_region;
pub mod base;
pub mod evict_leader;
pub mod grant_leader;
pub mod hot_region;
pub mod label;
pub mod random_merge;
pub mod registry;
pub mod scatter_range;
pub mod shuffle_leader;

pub use adjacent_region::AdjacentRegionScheduler;
pub use balance_leader::BalanceLeaderScheduler;
pub use balance_region::BalanceRegionScheduler;
pub use base::{adjust_balance_limit, should_balance, Scheduler};
pub use evict_leader::EvictLeaderScheduler;
pub use grant_leader::GrantLeaderScheduler;
pub use hot_region::BalanceHotRegionsScheduler;
pub use label::LabelScheduler;
pub use random_merge::RandomMergeScheduler;
pub use registry::{SchedulerError, SchedulerFactory, SchedulerRegistry};
pub use scatter_range::ScatterRangeScheduler;
pub use shuffle_leader::ShuffleLeaderScheduler;
