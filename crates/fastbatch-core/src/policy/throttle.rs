//! Sliding-window dispatch throttle.
//!
//! Keeps the timestamps of the last `limit` dispatches. A new dispatch is
//! admitted once the oldest of them has left the trailing `window`, so no
//! window of that length ever contains more than `limit` dispatches.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};

/// Throttle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Length of the trailing window.
    pub window: Duration,
    /// Maximum dispatches inside any one window.
    pub limit: usize,
}

/// Async sliding-window rate limiter.
///
/// The timestamp queue sits behind an async mutex that stays locked while an
/// acquirer waits for its slot, so waiters are admitted strictly in arrival
/// order and a freed slot cannot be taken by a later caller.
#[derive(Debug)]
pub struct SlidingWindow {
    config: ThrottleConfig,
    stamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            stamps: Mutex::new(VecDeque::with_capacity(config.limit)),
            config,
        }
    }

    /// Wait until one more dispatch fits in the window, then record it.
    pub async fn acquire(&self) {
        let mut stamps = self.stamps.lock().await;
        if stamps.len() < self.config.limit {
            stamps.push_back(Instant::now());
            return;
        }

        if let Some(oldest) = stamps.pop_front() {
            let wait = self.config.window.saturating_sub(oldest.elapsed());
            if !wait.is_zero() {
                tracing::trace!(wait_ms = wait.as_millis() as u64, "throttle: window full");
                time::sleep_until(oldest + self.config.window).await;
            }
        }
        stamps.push_back(Instant::now());
    }

    #[cfg(test)]
    async fn recorded(&self) -> usize {
        self.stamps.lock().await.len()
    }
}

/// Optional throttle: a no-op when no window is configured.
#[derive(Debug)]
pub struct Throttle {
    window: Option<SlidingWindow>,
}

impl Throttle {
    pub fn new(config: Option<ThrottleConfig>) -> Self {
        Self {
            window: config.map(SlidingWindow::new),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.window.is_some()
    }

    pub async fn acquire(&self) {
        if let Some(window) = &self.window {
            window.acquire().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn window(ms: u64, limit: usize) -> SlidingWindow {
        SlidingWindow::new(ThrottleConfig {
            window: Duration::from_millis(ms),
            limit,
        })
    }

    #[tokio::test]
    async fn acquire_within_limit_is_immediate() {
        let w = window(10_000, 5);
        let start = Instant::now();
        for _ in 0..5 {
            w.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(w.recorded().await, 5);
    }

    #[tokio::test]
    async fn acquire_over_limit_waits_for_window() {
        let w = window(200, 2);
        let start = Instant::now();
        w.acquire().await;
        w.acquire().await;
        w.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "elapsed={elapsed:?}");
        // Queue never grows past the limit.
        assert_eq!(w.recorded().await, 2);
    }

    #[tokio::test]
    async fn concurrent_acquirers_respect_cap() {
        let w = Arc::new(window(150, 2));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let w = w.clone();
            handles.push(tokio::spawn(async move {
                w.acquire().await;
                Instant::now()
            }));
        }
        let mut stamps = Vec::new();
        for h in handles {
            stamps.push(h.await.unwrap());
        }
        stamps.sort();
        // Any three consecutive admissions span (almost) a full window.
        for trio in stamps.windows(3) {
            assert!(trio[2] - trio[0] >= Duration::from_millis(140));
        }
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn unlimited_throttle_never_waits() {
        let t = Throttle::new(None);
        assert!(!t.is_enabled());
        let start = Instant::now();
        for _ in 0..1_000 {
            t.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
