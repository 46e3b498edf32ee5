//! Work-item stream shared by the workers of one run.
//!
//! Items are handed out in ascending index order. A failed item comes back
//! through [`WorkStream::retry`] with a ready time; once that time passes it
//! joins the back of the pending queue. The stream stays open while anything
//! is pending, waiting out a retry delay, or still held by a worker, and
//! waiters are woken through a [`Notify`] rather than by polling.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// One attempt at processing one element of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<A> {
    /// Position of the element in the input, fixed for the whole run.
    pub index: usize,
    pub argument: A,
    /// Zero-based attempt number.
    pub attempt: u32,
}

#[derive(Debug)]
struct Delayed<A> {
    ready_at: Instant,
    item: WorkItem<A>,
}

#[derive(Debug)]
struct StreamState<A> {
    pending: VecDeque<WorkItem<A>>,
    /// Retries sleeping out their backoff, ordered by `ready_at`.
    delayed: VecDeque<Delayed<A>>,
    /// Items handed out and not yet settled or returned for retry.
    outstanding: usize,
    closed: bool,
}

impl<A> StreamState<A> {
    fn promote_ready(&mut self, now: Instant) {
        while self.delayed.front().is_some_and(|d| d.ready_at <= now) {
            if let Some(d) = self.delayed.pop_front() {
                self.pending.push_back(d.item);
            }
        }
    }

    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.delayed.is_empty() && self.outstanding == 0
    }
}

/// Synchronized, retry-aware queue of [`WorkItem`]s.
#[derive(Debug)]
pub struct WorkStream<A> {
    state: Mutex<StreamState<A>>,
    notify: Notify,
}

impl<A> WorkStream<A> {
    /// Seed the stream with one first attempt per element, in order.
    pub fn new(items: impl IntoIterator<Item = A>) -> Self {
        let pending = items
            .into_iter()
            .enumerate()
            .map(|(index, argument)| WorkItem {
                index,
                argument,
                attempt: 0,
            })
            .collect();
        Self {
            state: Mutex::new(StreamState {
                pending,
                delayed: VecDeque::new(),
                outstanding: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next item to dispatch, or `None` once the stream is drained or closed.
    ///
    /// Waits while the pending queue is empty but retries are sleeping or
    /// other workers still hold items that may come back.
    pub async fn next(&self) -> Option<WorkItem<A>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wake_at = {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                state.promote_ready(Instant::now());
                if let Some(item) = state.pending.pop_front() {
                    state.outstanding += 1;
                    return Some(item);
                }
                if state.is_drained() {
                    return None;
                }
                state.delayed.front().map(|d| d.ready_at)
            };

            match wake_at {
                Some(at) => {
                    tokio::select! {
                        _ = notified.as_mut() => {}
                        _ = time::sleep_until(at) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Hand an item back for another attempt, dispatchable from `ready_at`.
    ///
    /// Dropped silently if the stream was closed.
    pub fn retry(&self, item: WorkItem<A>, ready_at: Instant) {
        {
            let mut state = self.lock();
            state.outstanding = state.outstanding.saturating_sub(1);
            if state.closed {
                return;
            }
            let pos = state.delayed.partition_point(|d| d.ready_at <= ready_at);
            state.delayed.insert(pos, Delayed { ready_at, item });
        }
        self.notify.notify_waiters();
    }

    /// Mark one handed-out item as settled.
    pub fn complete(&self) {
        let drained = {
            let mut state = self.lock();
            state.outstanding = state.outstanding.saturating_sub(1);
            state.is_drained()
        };
        if drained {
            self.notify.notify_waiters();
        }
    }

    /// Close the stream: every current and future `next` returns `None`.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.pending.clear();
            state.delayed.clear();
        }
        self.notify.notify_waiters();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Items waiting for dispatch, including retries still in backoff.
    pub fn remaining(&self) -> usize {
        let state = self.lock();
        state.pending.len() + state.delayed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn yields_in_index_order() {
        let s = WorkStream::new(vec!["a", "b", "c"]);
        for (i, expected) in ["a", "b", "c"].iter().enumerate() {
            let item = s.next().await.unwrap();
            assert_eq!(item.index, i);
            assert_eq!(item.argument, *expected);
            assert_eq!(item.attempt, 0);
            s.complete();
        }
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_stream_is_exhausted() {
        let s: WorkStream<u8> = WorkStream::new(Vec::new());
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn retry_goes_to_back_of_queue() {
        let s = WorkStream::new(vec![10, 20]);
        let first = s.next().await.unwrap();
        s.retry(
            WorkItem {
                attempt: 1,
                ..first
            },
            Instant::now(),
        );
        let next = s.next().await.unwrap();
        assert_eq!((next.index, next.attempt), (1, 0));
        s.complete();
        let again = s.next().await.unwrap();
        assert_eq!((again.index, again.attempt), (0, 1));
        s.complete();
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn waits_for_delayed_retry() {
        let s = WorkStream::new(vec![1]);
        let item = s.next().await.unwrap();
        let start = Instant::now();
        s.retry(
            WorkItem {
                attempt: 1,
                ..item
            },
            start + Duration::from_millis(80),
        );
        assert_eq!(s.remaining(), 1);
        let again = s.next().await.unwrap();
        assert_eq!(again.attempt, 1);
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn waiter_sees_retry_from_other_worker() {
        let s = Arc::new(WorkStream::new(vec![7]));
        let held = s.next().await.unwrap();

        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        s.retry(
            WorkItem {
                attempt: 1,
                ..held
            },
            Instant::now(),
        );
        let got = waiter.await.unwrap().unwrap();
        assert_eq!((got.index, got.attempt), (0, 1));
    }

    #[tokio::test]
    async fn waiter_released_when_last_item_completes() {
        let s = Arc::new(WorkStream::new(vec![7]));
        let _held = s.next().await.unwrap();
        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        s.complete();
        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_wakes_waiters_and_drops_retries() {
        let s = Arc::new(WorkStream::new(vec![1, 2]));
        let a = s.next().await.unwrap();
        let _b = s.next().await.unwrap();
        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        s.close();
        assert!(waiter.await.unwrap().is_none());
        s.retry(WorkItem { attempt: 1, ..a }, Instant::now());
        assert!(s.is_closed());
        assert_eq!(s.remaining(), 0);
        assert!(s.next().await.is_none());
    }
}
