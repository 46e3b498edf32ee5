//! Batch-level error types.

use thiserror::Error;

/// Errors raised while building or validating [`BatchOptions`](crate::BatchOptions).
#[derive(Debug, Error)]
pub enum OptionsError {
    /// `concurrency` was explicitly set to zero.
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    /// `rate_window_ms` was set but is zero.
    #[error("rate window must be a positive number of milliseconds")]
    ZeroRateWindow,

    /// `rate_limit` was set but is zero.
    #[error("rate limit must allow at least 1 dispatch per window")]
    ZeroRateLimit,

    /// Options could not be parsed from JSON.
    #[error("invalid options document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors returned by a batch run.
///
/// `E` is the error type of the user operation. A fatal abort carries the
/// operation's error exactly as it was returned.
#[derive(Debug, Error)]
pub enum BatchError<E> {
    /// Rejected before any work started.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] OptionsError),

    /// An item exhausted its retries while failures were not ignored.
    #[error("item {index} failed after {attempts} attempt(s): {source}")]
    Aborted {
        index: usize,
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> BatchError<E> {
    /// Returns `true` if the batch was aborted by an operation failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// Consume the error and return the operation's original error, if any.
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::Aborted { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Error returned by a [`FailureHook`](crate::FailureHook).
///
/// Hook errors are logged and otherwise ignored; they never abort a batch.
#[derive(Debug, Error)]
#[error("failure hook error: {0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
