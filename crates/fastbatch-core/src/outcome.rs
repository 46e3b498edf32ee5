//! Per-item outcomes and run statistics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal outcome of one input element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// `attempts` counts the failed attempts before the successful one.
    Success { value: T, attempts: u32 },
    /// `attempts` counts every invocation, including the last.
    Failed { error: E, attempts: u32 },
}

impl<T, E> Outcome<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Success { value, .. } => Ok(value),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

/// Counters for one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub items: usize,
    pub workers: usize,
    /// Operation invocations, retries included.
    pub dispatched: usize,
    pub retried: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    dispatched: AtomicUsize,
    retried: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl StatsCounters {
    pub fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, items: usize, workers: usize, elapsed: Duration) -> BatchStats {
        BatchStats {
            items,
            workers,
            dispatched: self.dispatched.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}
