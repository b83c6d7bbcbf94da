use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use serde::{Serialize, Deserialize};

/// Engine counters. Atomic so handlers can bump them without locking.
#[derive(Clone, Default)]
pub struct Metrics {
    pub pace_updates: Arc<AtomicU64>,
    pub goals_allocated: Arc<AtomicU64>,
    pub advice_given: Arc<AtomicU64>,
    pub summaries_computed: Arc<AtomicU64>,
    pub records_completed: Arc<AtomicU64>,
    /// Inputs rejected as contract violations
    pub rejected_inputs: Arc<AtomicU64>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub pace_updates: u64,
    pub goals_allocated: u64,
    pub advice_given: u64,
    pub summaries_computed: u64,
    pub records_completed: u64,
    pub rejected_inputs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pace_update(&self) {
        self.pace_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_goals_allocated(&self, count: usize) {
        self.goals_allocated.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_advice(&self) {
        self.advice_given.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_summary(&self) {
        self.summaries_computed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.records_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejected_inputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pace_updates: self.pace_updates.load(Ordering::Relaxed),
            goals_allocated: self.goals_allocated.load(Ordering::Relaxed),
            advice_given: self.advice_given.load(Ordering::Relaxed),
            summaries_computed: self.summaries_computed.load(Ordering::Relaxed),
            records_completed: self.records_completed.load(Ordering::Relaxed),
            rejected_inputs: self.rejected_inputs.load(Ordering::Relaxed),
        }
    }
}
