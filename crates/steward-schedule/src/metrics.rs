//! Event counters for scheduler outcomes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically increasing counter, cheap to clone and share.
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// A counter starting at zero.
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Adds one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Counter {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

/// Outcome counters kept by every scheduler. Transient absence (no store, no
/// candidate region, balance rule rejection) is recorded here rather than
/// surfaced as an error.
#[derive(Clone, Default)]
pub struct SchedulerMetrics {
    /// Schedule invocations.
    pub schedule: Counter,
    /// Ticks that found no usable source or target store.
    pub no_candidate: Counter,
    /// Candidate moves rejected by a filter, gate, or the balance rule.
    pub skip: Counter,
    /// Operators emitted.
    pub new_operator: Counter,
}

impl SchedulerMetrics {
    /// Fresh counters, all zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// One line per counter in `name value` text form.
    pub fn render(&self, scheduler: &str) -> String {
        format!(
            "{scheduler}_schedule {}\n{scheduler}_no_candidate {}\n{scheduler}_skip {}\n{scheduler}_new_operator {}\n",
            self.schedule.get(),
            self.no_candidate.get(),
            self.skip.get(),
            self.new_operator.get(),
        )
    }
}
