//! Cooperative stop signal shared by all workers of one run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// The failure that stopped a run.
#[derive(Debug)]
pub struct Fault<E> {
    pub index: usize,
    pub attempts: u32,
    pub error: E,
}

/// Abort flag plus the first fatal error.
///
/// Once tripped the flag never resets. Only the first `trip` stores its
/// fault; later calls are no-ops.
#[derive(Debug)]
pub struct StopSignal<E> {
    aborted: AtomicBool,
    fault: Mutex<Option<Fault<E>>>,
}

impl<E> StopSignal<E> {
    pub fn new() -> Self {
        Self {
            aborted: AtomicBool::new(false),
            fault: Mutex::new(None),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Trip the signal. Returns `true` if this call won and its fault was kept.
    pub fn trip(&self, fault: Fault<E>) -> bool {
        if self
            .aborted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *self.fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(fault);
        true
    }

    /// Consume the signal, yielding the winning fault if it was tripped.
    pub fn into_fault(self) -> Option<Fault<E>> {
        self.fault
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E> Default for StopSignal<E> {
    fn default() -> Self {
        Self::new()
    }
}
