//! Batch run options.
//!
//! Options deserialize from JSON using either the snake_case field names or
//! the historical camelCase names (`retry`, `sizeLimit`, `sleepOnRetry`,
//! `windowSize`, `ignoreExceptions`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// User-facing configuration for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Maximum operations in flight (`None` = collection length).
    #[serde(alias = "sizeLimit", skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Retries per item after the first attempt.
    #[serde(alias = "retry", alias = "maxRetries")]
    pub max_retries: u32,
    /// Record exhausted items as failed instead of aborting the batch.
    #[serde(alias = "ignoreExceptions", alias = "ignoreFailures")]
    pub ignore_failures: bool,
    /// Minimum pacing between a failure and its retry, in milliseconds.
    #[serde(alias = "sleepOnRetry", alias = "retryDelayMs")]
    pub retry_delay_ms: u64,
    /// Sliding throttle window in milliseconds (`None` = no throttling).
    #[serde(
        alias = "windowSize",
        alias = "rateWindowMs",
        skip_serializing_if = "Option::is_none"
    )]
    pub rate_window_ms: Option<u64>,
    /// Dispatches allowed per window (`None` = effective concurrency).
    #[serde(alias = "rateLimit", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<usize>,
    /// Log every operation failure at `warn` instead of `debug`.
    #[serde(alias = "logFailures")]
    pub log_failures: bool,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = Some(n);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn ignore_failures(mut self, ignore: bool) -> Self {
        self.ignore_failures = ignore;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn rate_window(mut self, window: Duration) -> Self {
        self.rate_window_ms = Some(window.as_millis() as u64);
        self
    }

    pub fn rate_limit(mut self, n: usize) -> Self {
        self.rate_limit = Some(n);
        self
    }

    pub fn log_failures(mut self, enabled: bool) -> Self {
        self.log_failures = enabled;
        self
    }

    /// Reject option values no run can honour.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.concurrency == Some(0) {
            return Err(OptionsError::ZeroConcurrency);
        }
        if self.rate_window_ms == Some(0) {
            return Err(OptionsError::ZeroRateWindow);
        }
        if self.rate_limit == Some(0) {
            return Err(OptionsError::ZeroRateLimit);
        }
        Ok(())
    }

    /// Resolve defaults against a collection of `len` items.
    pub(crate) fn resolve(&self, len: usize, collect_results: bool) -> RunConfig {
        let concurrency = self.concurrency.unwrap_or(len).min(len).max(1);
        RunConfig {
            concurrency,
            max_retries: self.max_retries,
            ignore_failures: self.ignore_failures,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            rate_window: self.rate_window_ms.map(Duration::from_millis),
            rate_limit: self.rate_limit.unwrap_or(concurrency),
            log_failures: self.log_failures,
            collect_results,
        }
    }
}

/// Options after defaulting and clamping, fixed for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    pub ignore_failures: bool,
    pub retry_delay: Duration,
    pub rate_window: Option<Duration>,
    pub rate_limit: usize,
    pub log_failures: bool,
    pub collect_results: bool,
}
