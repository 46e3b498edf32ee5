//! Dispatch policies applied by every worker.
//!
//! ```text
//! Worker → [Throttle] → [WorkStream] → operation → [RetryPolicy]
//! ```

pub mod retry;
pub mod throttle;

pub use retry::{RetryDecision, RetryPolicy};
pub use throttle::{SlidingWindow, Throttle, ThrottleConfig};
