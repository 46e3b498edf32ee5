//! Failure notification hook.

use async_trait::async_trait;

use crate::error::HookError;

/// A single failed attempt, as seen by a [`FailureHook`].
#[derive(Debug)]
pub struct FailureEvent<'a, A, E> {
    pub index: usize,
    pub argument: &'a A,
    /// Zero-based attempt that failed.
    pub attempt: u32,
    pub error: &'a E,
}

/// Observer invoked after every failed attempt, before the retry decision.
///
/// Awaited by the worker that saw the failure. An `Err` is logged and
/// otherwise ignored: hooks cannot abort a batch.
///
/// Plain closures `Fn(&FailureEvent<A, E>) -> Result<(), HookError>`
/// implement this trait directly.
#[async_trait]
pub trait FailureHook<A, E>: Send + Sync {
    async fn on_failure(&self, event: FailureEvent<'_, A, E>) -> Result<(), HookError>;
}

#[async_trait]
impl<A, E, F> FailureHook<A, E> for F
where
    A: Sync,
    E: Sync,
    F: Fn(&FailureEvent<'_, A, E>) -> Result<(), HookError> + Send + Sync,
{
    async fn on_failure(&self, event: FailureEvent<'_, A, E>) -> Result<(), HookError> {
        self(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn closure_hook_is_called() {
        let seen = AtomicU32::new(0);
        let hook = |event: &FailureEvent<'_, u32, String>| -> Result<(), HookError> {
            seen.fetch_add(event.attempt + 1, Ordering::SeqCst);
            Ok(())
        };
        let err = "nope".to_string();
        hook.on_failure(FailureEvent {
            index: 0,
            argument: &5u32,
            attempt: 2,
            error: &err,
        })
        .await
        .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn hook_error_is_returned_to_caller() {
        let hook = |_: &FailureEvent<'_, u32, String>| -> Result<(), HookError> {
            Err(HookError::new("sink down"))
        };
        let err = "nope".to_string();
        let res = hook
            .on_failure(FailureEvent {
                index: 1,
                argument: &1u32,
                attempt: 0,
                error: &err,
            })
            .await;
        assert_eq!(res.unwrap_err().to_string(), "failure hook error: sink down");
    }
}
