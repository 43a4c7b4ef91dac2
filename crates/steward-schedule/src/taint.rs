//! TTL-bounded set of stores recently found unproductive.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use steward_model::StoreId;

/// Default time a tainted store stays excluded.
pub const TAINT_TTL: Duration = Duration::from_secs(3 * 60);

/// Default capacity bound on the taint set.
pub const TAINT_CAPACITY: usize = 16 * 1024;

/// Stores that were selected recently but produced no operator. Schedulers
/// skip them for a short period to avoid re-examining the same dead end
/// every tick. Entries expire after the TTL; the owner clears the whole set
/// whenever selection comes up empty so the scheduler can adapt to sudden
/// load changes.
pub struct TaintCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<StoreId, Instant>>,
}

impl TaintCache {
    /// A cache with the standard TTL and capacity.
    pub fn new() -> Self {
        Self::with_ttl(TAINT_TTL, TAINT_CAPACITY)
    }

    /// A cache with explicit bounds, for tests.
    pub fn with_ttl(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Marks a store as unproductive until the TTL lapses. At capacity the
    /// oldest entry is dropped first.
    pub fn put(&self, store_id: StoreId) {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        entries.retain(|_, inserted| now.duration_since(*inserted) < self.ttl);
        if entries.len() >= self.capacity && !entries.contains_key(&store_id) {
            if let Some(oldest) = entries.iter().min_by_key(|(_, t)| **t).map(|(id, _)| *id) {
                entries.remove(&oldest);
            }
        }
        entries.insert(store_id, now);
    }

    /// True when the store is currently tainted.
    pub fn contains(&self, store_id: StoreId) -> bool {
        let entries = self.entries.lock().unwrap();
        match entries.get(&store_id) {
            Some(inserted) => inserted.elapsed() < self.ttl,
            None => false,
        }
    }

    /// Removes one store.
    pub fn remove(&self, store_id: StoreId) {
        self.entries.lock().unwrap().remove(&store_id);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap();
        entries.values().filter(|t| t.elapsed() < self.ttl).count()
    }

    /// True when nothing is tainted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaintCache {
    fn default() -> Self {
        Self::new()
    }
}
