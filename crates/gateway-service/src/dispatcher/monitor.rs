//! Dispatch queue monitoring.
//!
//! Tracks the depth of the owner's work queue and the outcome counters of
//! executed items:
//!
//! | Level    | Depth            |
//! |----------|------------------|
//! | Normal   | `<= 16`          |
//! | Warning  | `17..=48`        |
//! | Critical | `> 48`           |
//!
//! Depth is also published as the `gateway_dispatch_queue_depth` gauge.

use crate::observability::metrics::set_dispatch_queue_depth;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Queue depth above which the monitor reports `Warning`.
pub const QUEUE_DEPTH_NORMAL: usize = 16;

/// Queue depth above which the monitor reports `Critical`.
pub const QUEUE_DEPTH_WARNING: usize = 48;

/// Queue depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLevel {
    Normal,
    Warning,
    Critical,
}

/// How a dequeued work item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The work returned `Ok`.
    Completed,
    /// The work returned `Err`.
    Failed,
    /// The work panicked; the owner caught it and carried on.
    Panicked,
    /// The caller stopped waiting before the owner reached the item.
    Abandoned,
}

impl ItemOutcome {
    /// Returns the outcome as a string for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Completed => "completed",
            ItemOutcome::Failed => "failed",
            ItemOutcome::Panicked => "panicked",
            ItemOutcome::Abandoned => "abandoned",
        }
    }
}

/// Queue monitor shared by callers (enqueue) and the owner thread (dequeue).
#[derive(Debug)]
pub struct QueueMonitor {
    /// Owner name for log fields.
    owner: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    abandoned: AtomicU64,
}

impl QueueMonitor {
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
        }
    }

    /// Record an item entering the queue.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;

        let mut current_peak = self.peak_depth.load(Ordering::Relaxed);
        while new_depth > current_peak {
            match self.peak_depth.compare_exchange_weak(
                current_peak,
                new_depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }

        set_dispatch_queue_depth(new_depth);

        let level = Self::level_for_depth(new_depth);
        if level == QueueLevel::Critical {
            warn!(
                target: "gateway.dispatcher.queue",
                owner = %self.owner,
                depth = new_depth,
                threshold = QUEUE_DEPTH_WARNING,
                "Dispatch queue depth critical"
            );
        } else if level == QueueLevel::Warning && new_depth == QUEUE_DEPTH_NORMAL + 1 {
            debug!(
                target: "gateway.dispatcher.queue",
                owner = %self.owner,
                depth = new_depth,
                "Dispatch queue depth elevated"
            );
        }
    }

    /// Record the owner taking an item off the queue.
    pub fn record_dequeue(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0);
        set_dispatch_queue_depth(previous.saturating_sub(1));
    }

    /// Record how a dequeued item ended.
    pub fn record_outcome(&self, outcome: ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Completed => &self.completed,
            ItemOutcome::Failed => &self.failed,
            ItemOutcome::Panicked => &self.panicked,
            ItemOutcome::Abandoned => &self.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    /// Total items the owner dequeued, whatever their outcome.
    #[must_use]
    pub fn items_processed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
            + self.panicked.load(Ordering::Relaxed)
            + self.abandoned.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn items_failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed) + self.panicked.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn items_panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn items_abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> QueueLevel {
        Self::level_for_depth(self.current_depth())
    }

    /// Reset peak depth to the current depth.
    pub fn reset_peak(&self) {
        self.peak_depth
            .store(self.current_depth(), Ordering::Relaxed);
    }

    fn level_for_depth(depth: usize) -> QueueLevel {
        if depth > QUEUE_DEPTH_WARNING {
            QueueLevel::Critical
        } else if depth > QUEUE_DEPTH_NORMAL {
            QueueLevel::Warning
        } else {
            QueueLevel::Normal
        }
    }
}
