//! fastbatch-core — bounded-concurrency batch execution.
//!
//! # Overview
//!
//! Runs an async operation over every element of a collection with:
//!
//! - at most `concurrency` operations in flight
//! - per-item retries with a fixed minimum delay
//! - an optional sliding-window cap on dispatches per time window
//! - either fail-fast (first exhausted item aborts the batch) or tolerant
//!   (exhausted items are recorded as failed) error handling
//!
//! Results come back in input order no matter which item finished first.
//!
//! - [`map`] / [`for_each`] — one-call entry points
//! - [`BatchExecutor`] — reusable executor with an optional [`FailureHook`]
//! - [`BatchOptions`] — run configuration, loadable from JSON
//! - [`policy`] module — retry policy and sliding-window throttle
//! - [`stream`] module — the retry-aware work queue shared by workers

pub mod engine;
pub mod error;
pub mod hook;
pub mod options;
pub mod outcome;
pub mod policy;
pub mod signal;
pub mod stream;

pub use engine::{for_each, map, BatchExecutor};
pub use error::{BatchError, HookError, OptionsError};
pub use hook::{FailureEvent, FailureHook};
pub use options::BatchOptions;
pub use outcome::{BatchStats, Outcome};
