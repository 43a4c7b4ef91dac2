//! Rolling per-region flow statistics and hot-region classification.
//!
//! One cache instance tracks both flow directions. Region heartbeats feed
//! it; schedulers scan it. A region turns hot after enough consecutive
//! heartbeats above the flow threshold, and cools down through an
//! anti-count instead of dropping out on the first quiet heartbeat.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde::{Deserialize, Serialize};

use steward_model::{FlowKind, Region, RegionId, Store, StoreId};

/// Seconds covered by one region heartbeat report.
pub const REGION_HEARTBEAT_REPORT_INTERVAL_SECS: u64 = 60;

/// Seconds covered by one store heartbeat report.
pub const STORE_HEARTBEAT_REPORT_INTERVAL_SECS: u64 = 10;

/// Bound on tracked regions per flow direction.
pub const STAT_CACHE_MAX_LEN: usize = 1000;

/// Floor on the write-flow hot threshold, bytes per second.
pub const HOT_WRITE_REGION_MIN_FLOW_RATE: u64 = 16 * 1024;

/// Floor on the read-flow hot threshold, bytes per second.
pub const HOT_READ_REGION_MIN_FLOW_RATE: u64 = 128 * 1024;

/// Quiet heartbeats an entry survives before eviction.
pub const HOT_REGION_ANTI_COUNT: u64 = 1;

/// Rolling statistics for one region in one flow direction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStats {
    /// The tracked region.
    pub region_id: RegionId,
    /// The region's leader store at the last update; flow is attributed to
    /// it.
    pub store_id: StoreId,
    /// Flow rate in bytes per second.
    pub flow_bytes: u64,
    /// Flow rate in keys per second.
    pub flow_keys: u64,
    /// Consecutive-hot heartbeat counter; decays while quiet.
    pub hot_degree: u64,
    /// Quiet heartbeats left before the entry is evicted.
    pub anti_count: u64,
    /// Seconds-since-epoch of the last update.
    pub last_update_secs: u64,
}

/// Shared cache of hot-region candidates for both flow directions.
pub struct HotCache {
    write_flow: Mutex<LruCache<RegionId, FlowStats>>,
    read_flow: Mutex<LruCache<RegionId, FlowStats>>,
}

impl HotCache {
    /// A cache bounded at the standard capacity per direction.
    pub fn new() -> Self {
        let cap = NonZeroUsize::new(STAT_CACHE_MAX_LEN).unwrap();
        Self {
            write_flow: Mutex::new(LruCache::new(cap)),
            read_flow: Mutex::new(LruCache::new(cap)),
        }
    }

    fn flow(&self, kind: FlowKind) -> &Mutex<LruCache<RegionId, FlowStats>> {
        match kind {
            FlowKind::Write => &self.write_flow,
            FlowKind::Read => &self.read_flow,
        }
    }

    /// The hot threshold in bytes per second, derived from store-level rate
    /// statistics. Write flow divides by an extra factor of two because
    /// stores report roughly twice the bytes a region records.
    pub fn flow_threshold(&self, kind: FlowKind, stores: &[Store]) -> u64 {
        let total: u64 = stores
            .iter()
            .map(|s| match kind {
                FlowKind::Write => s.written_bytes,
                FlowKind::Read => s.read_bytes,
            })
            .sum();
        let total_rate = total / STORE_HEARTBEAT_REPORT_INTERVAL_SECS;
        let (divisor, floor) = match kind {
            FlowKind::Write => (STAT_CACHE_MAX_LEN as u64 * 2, HOT_WRITE_REGION_MIN_FLOW_RATE),
            FlowKind::Read => (STAT_CACHE_MAX_LEN as u64, HOT_READ_REGION_MIN_FLOW_RATE),
        };
        (total_rate / divisor).max(floor)
    }

    /// Folds one region heartbeat into the cache. A heartbeat at or above
    /// the threshold bumps the hot degree and refreshes the anti-count; a
    /// quiet heartbeat decays both and evicts the entry once the anti-count
    /// is spent.
    pub fn update(&self, kind: FlowKind, region: &Region, stores: &[Store], now_secs: u64) {
        let store_id = match region.leader_store_id() {
            Some(id) => id,
            None => return,
        };
        let (bytes, keys) = match kind {
            FlowKind::Write => (region.written_bytes, region.written_keys),
            FlowKind::Read => (region.read_bytes, region.read_keys),
        };
        let flow_bytes = bytes / REGION_HEARTBEAT_REPORT_INTERVAL_SECS;
        let flow_keys = keys / REGION_HEARTBEAT_REPORT_INTERVAL_SECS;
        let threshold = self.flow_threshold(kind, stores);

        let mut cache = self.flow(kind).lock().unwrap();
        let old = cache.peek(&region.id).cloned();
        if flow_bytes >= threshold {
            let stats = FlowStats {
                region_id: region.id,
                store_id,
                flow_bytes,
                flow_keys,
                hot_degree: old.as_ref().map(|o| o.hot_degree + 1).unwrap_or(1),
                anti_count: HOT_REGION_ANTI_COUNT,
                last_update_secs: now_secs,
            };
            cache.put(region.id, stats);
            return;
        }
        match old {
            None => {}
            Some(old) if old.anti_count == 0 => {
                cache.pop(&region.id);
            }
            Some(old) => {
                let stats = FlowStats {
                    region_id: region.id,
                    store_id,
                    flow_bytes: old.flow_bytes,
                    flow_keys: old.flow_keys,
                    hot_degree: old.hot_degree.saturating_sub(1),
                    anti_count: old.anti_count - 1,
                    last_update_secs: now_secs,
                };
                cache.put(region.id, stats);
            }
        }
    }

    /// True when either flow direction holds the region at or above the
    /// given hot degree.
    pub fn is_region_hot(&self, region_id: RegionId, low_threshold: u64) -> bool {
        for kind in [FlowKind::Write, FlowKind::Read] {
            let cache = self.flow(kind).lock().unwrap();
            if let Some(stats) = cache.peek(&region_id) {
                if stats.hot_degree >= low_threshold {
                    return true;
                }
            }
        }
        false
    }

    /// Every tracked entry for a flow direction, ordered by region id.
    pub fn region_stats(&self, kind: FlowKind) -> Vec<FlowStats> {
        let cache = self.flow(kind).lock().unwrap();
        let mut stats: Vec<FlowStats> = cache.iter().map(|(_, v)| v.clone()).collect();
        stats.sort_by_key(|s| s.region_id);
        stats
    }

    /// Tracked entries attributed to one store at or above the hot degree,
    /// ordered by region id.
    pub fn store_stats(&self, kind: FlowKind, store_id: StoreId, low_threshold: u64) -> Vec<FlowStats> {
        self.region_stats(kind)
            .into_iter()
            .filter(|s| s.store_id == store_id && s.hot_degree >= low_threshold)
            .collect()
    }
}

impl Default for HotCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_model::{Peer, PeerId};

    fn region(id: u64, leader_store: u64, written: u64, read: u64) -> Region {
        let mut region = Region::new(RegionId::new(id));
        let leader = Peer {
            id: PeerId::new(id * 100),
            store_id: StoreId::new(leader_store),
        };
        region.peers = vec![leader];
        region.leader = Some(leader);
        region.written_bytes = written;
        region.read_bytes = read;
        region
    }

    fn quiet_stores() -> Vec<Store> {
        (1..=3).map(|i| Store::new(StoreId::new(i))).collect()
    }

    #[test]
    fn threshold_falls_back_to_floor() {
        let cache = HotCache::new();
        let stores = quiet_stores();
        assert_eq!(
            cache.flow_threshold(FlowKind::Write, &stores),
            HOT_WRITE_REGION_MIN_FLOW_RATE
        );
        assert_eq!(
            cache.flow_threshold(FlowKind::Read, &stores),
            HOT_READ_REGION_MIN_FLOW_RATE
        );
    }

    #[test]
    fn threshold_scales_with_store_rates() {
        let cache = HotCache::new();
        let mut stores = quiet_stores();
        // 1 TiB per store heartbeat across the cluster.
        stores[0].written_bytes = 1 << 40;
        let per_sec = (1u64 << 40) / STORE_HEARTBEAT_REPORT_INTERVAL_SECS;
        assert_eq!(
            cache.flow_threshold(FlowKind::Write, &stores),
            per_sec / (STAT_CACHE_MAX_LEN as u64 * 2)
        );
    }

    #[test]
    fn hot_degree_climbs_on_hot_heartbeats() {
        let cache = HotCache::new();
        let stores = quiet_stores();
        let r = region(1, 1, 512 * 1024 * REGION_HEARTBEAT_REPORT_INTERVAL_SECS, 0);
        cache.update(FlowKind::Write, &r, &stores, 0);
        cache.update(FlowKind::Write, &r, &stores, 60);
        let stats = cache.region_stats(FlowKind::Write);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].hot_degree, 2);
        assert_eq!(stats[0].flow_bytes, 512 * 1024);
        assert!(cache.is_region_hot(RegionId::new(1), 2));
    }

    #[test]
    fn cold_region_never_enters_cache() {
        let cache = HotCache::new();
        let stores = quiet_stores();
        let r = region(1, 1, 0, 24 * 1024 * REGION_HEARTBEAT_REPORT_INTERVAL_SECS);
        cache.update(FlowKind::Read, &r, &stores, 0);
        assert!(cache.region_stats(FlowKind::Read).is_empty());
        assert!(!cache.is_region_hot(RegionId::new(1), 0));
    }

    #[test]
    fn quiet_heartbeats_decay_then_evict() {
        let cache = HotCache::new();
        let stores = quiet_stores();
        let hot = region(1, 1, 512 * 1024 * REGION_HEARTBEAT_REPORT_INTERVAL_SECS, 0);
        let cold = region(1, 1, 0, 0);
        cache.update(FlowKind::Write, &hot, &stores, 0);
        cache.update(FlowKind::Write, &cold, &stores, 60);
        let stats = cache.region_stats(FlowKind::Write);
        assert_eq!(stats[0].hot_degree, 0);
        assert_eq!(stats[0].anti_count, 0);
        cache.update(FlowKind::Write, &cold, &stores, 120);
        assert!(cache.region_stats(FlowKind::Write).is_empty());
    }

    #[test]
    fn store_stats_filters_by_attribution() {
        let cache = HotCache::new();
        let stores = quiet_stores();
        let bytes = 512 * 1024 * REGION_HEARTBEAT_REPORT_INTERVAL_SECS;
        cache.update(FlowKind::Read, &region(1, 1, 0, bytes), &stores, 0);
        cache.update(FlowKind::Read, &region(2, 2, 0, bytes), &stores, 0);
        cache.update(FlowKind::Read, &region(3, 1, 0, bytes), &stores, 0);
        let on_store_1 = cache.store_stats(FlowKind::Read, StoreId::new(1), 1);
        assert_eq!(on_store_1.len(), 2);
        assert_eq!(on_store_1[0].region_id, RegionId::new(1));
        assert_eq!(on_store_1[1].region_id, RegionId::new(3));
    }
}
