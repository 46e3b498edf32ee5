//! `BatchExecutor` — bounded worker pool over a [`WorkStream`].
//!
//! A run builds its shared state (stream, throttle, stop signal, result
//! table), starts `concurrency` workers as futures on the caller's task and
//! waits for all of them. Workers only stop early when the stop signal is
//! tripped by a fatal failure; calls already in flight are left to finish.

use std::fmt::Display;
use std::future::Future;
use std::sync::OnceLock;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::BatchError;
use crate::hook::{FailureEvent, FailureHook};
use crate::options::{BatchOptions, RunConfig};
use crate::outcome::{BatchStats, Outcome, StatsCounters};
use crate::policy::{RetryDecision, RetryPolicy, Throttle, ThrottleConfig};
use crate::signal::{Fault, StopSignal};
use crate::stream::{WorkItem, WorkStream};

/// Executes an async operation over a collection with bounded concurrency,
/// per-item retry and optional sliding-window throttling.
pub struct BatchExecutor<A, E> {
    options: BatchOptions,
    hook: Option<Box<dyn FailureHook<A, E>>>,
}

/// State shared by every worker of one run.
struct Run<'r, A, T, E, F> {
    config: RunConfig,
    retry: RetryPolicy,
    stream: WorkStream<A>,
    throttle: Throttle,
    stop: StopSignal<E>,
    /// One write-once cell per input index.
    results: Vec<OnceLock<Outcome<T, E>>>,
    stats: StatsCounters,
    hook: Option<&'r dyn FailureHook<A, E>>,
    op: &'r F,
}

impl<A, E> BatchExecutor<A, E>
where
    A: Clone,
    E: Display,
{
    pub fn new(options: BatchOptions) -> Self {
        Self {
            options,
            hook: None,
        }
    }

    /// Attach a hook called after every failed attempt.
    pub fn with_failure_hook(mut self, hook: impl FailureHook<A, E> + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Run `op` over every item and return the outcomes in input order.
    pub async fn map<I, T, F, Fut>(&self, items: I, op: F) -> Result<Vec<Outcome<T, E>>, BatchError<E>>
    where
        I: IntoIterator<Item = A>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.map_with_stats(items, op).await.map(|(outcomes, _)| outcomes)
    }

    /// Like [`map`](Self::map), also returning the run's counters.
    pub async fn map_with_stats<I, T, F, Fut>(
        &self,
        items: I,
        op: F,
    ) -> Result<(Vec<Outcome<T, E>>, BatchStats), BatchError<E>>
    where
        I: IntoIterator<Item = A>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (outcomes, stats) = self.execute(items, &op, true).await?;
        Ok((outcomes.unwrap_or_default(), stats))
    }

    /// Run `op` over every item, discarding the values.
    pub async fn for_each<I, T, F, Fut>(&self, items: I, op: F) -> Result<(), BatchError<E>>
    where
        I: IntoIterator<Item = A>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.for_each_with_stats(items, op).await.map(|_| ())
    }

    /// Like [`for_each`](Self::for_each), returning the run's counters.
    pub async fn for_each_with_stats<I, T, F, Fut>(
        &self,
        items: I,
        op: F,
    ) -> Result<BatchStats, BatchError<E>>
    where
        I: IntoIterator<Item = A>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (_, stats) = self.execute(items, &op, false).await?;
        Ok(stats)
    }

    async fn execute<I, T, F, Fut>(
        &self,
        items: I,
        op: &F,
        collect_results: bool,
    ) -> Result<(Option<Vec<Outcome<T, E>>>, BatchStats), BatchError<E>>
    where
        I: IntoIterator<Item = A>,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.options.validate()?;

        let stream = WorkStream::new(items);
        let total = stream.remaining();
        if total == 0 {
            debug!("batch: empty input, nothing to do");
            let outcomes = collect_results.then(Vec::new);
            return Ok((outcomes, BatchStats::default()));
        }

        let config = self.options.resolve(total, collect_results);
        let throttle = Throttle::new(config.rate_window.map(|window| ThrottleConfig {
            window,
            limit: config.rate_limit,
        }));
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            delay: config.retry_delay,
            ignore_failures: config.ignore_failures,
        };

        info!(
            items = total,
            concurrency = config.concurrency,
            max_retries = config.max_retries,
            ignore_failures = config.ignore_failures,
            throttled = throttle.is_enabled(),
            "batch: starting"
        );

        let run = Run {
            retry,
            stream,
            throttle,
            stop: StopSignal::new(),
            results: if collect_results {
                (0..total).map(|_| OnceLock::new()).collect()
            } else {
                Vec::new()
            },
            stats: StatsCounters::default(),
            hook: self.hook.as_deref(),
            op,
            config,
        };

        let started = Instant::now();
        let workers = run.config.concurrency;
        join_all((0..workers).map(|id| run.worker(id))).await;
        let stats = run.stats.snapshot(total, workers, started.elapsed());

        if let Some(fault) = run.stop.into_fault() {
            warn!(
                index = fault.index,
                attempts = fault.attempts,
                error = %fault.error,
                elapsed_ms = stats.elapsed_ms,
                "batch: aborted"
            );
            return Err(BatchError::Aborted {
                index: fault.index,
                attempts: fault.attempts,
                source: fault.error,
            });
        }

        info!(
            dispatched = stats.dispatched,
            retried = stats.retried,
            succeeded = stats.succeeded,
            failed = stats.failed,
            elapsed_ms = stats.elapsed_ms,
            "batch: complete"
        );

        if !collect_results {
            return Ok((None, stats));
        }
        // Without a fault every worker ran the stream dry, so every cell is set.
        let outcomes: Vec<_> = run.results.into_iter().filter_map(OnceLock::into_inner).collect();
        debug_assert_eq!(outcomes.len(), total);
        Ok((Some(outcomes), stats))
    }
}

impl<'r, A, T, E, F, Fut> Run<'r, A, T, E, F>
where
    A: Clone,
    E: Display,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    async fn worker(&self, id: usize) {
        loop {
            if self.stop.is_aborted() {
                break;
            }
            let Some(item) = self.stream.next().await else {
                break;
            };
            // The throttle stamps the dispatch instant, so the slot is taken
            // only once an item is in hand.
            self.throttle.acquire().await;
            if self.stop.is_aborted() {
                break;
            }

            self.stats.dispatched();
            debug!(worker = id, index = item.index, attempt = item.attempt, "batch: dispatch");

            let result = (self.op)(item.argument.clone()).await;
            match result {
                Ok(value) => {
                    self.stats.succeeded();
                    self.record(item.index, Outcome::Success {
                        value,
                        attempts: item.attempt,
                    });
                    self.stream.complete();
                }
                Err(error) => {
                    if !self.handle_failure(id, item, error).await {
                        break;
                    }
                }
            }
        }
        debug!(worker = id, "batch: worker finished");
    }

    /// Returns `false` when the failure is fatal and the worker must stop.
    async fn handle_failure(&self, id: usize, item: WorkItem<A>, error: E) -> bool {
        let failed_at = Instant::now();
        if self.config.log_failures {
            warn!(worker = id, index = item.index, attempt = item.attempt, error = %error, "batch: operation failed");
        } else {
            debug!(worker = id, index = item.index, attempt = item.attempt, error = %error, "batch: operation failed");
        }

        if let Some(hook) = self.hook {
            let event = FailureEvent {
                index: item.index,
                argument: &item.argument,
                attempt: item.attempt,
                error: &error,
            };
            if let Err(e) = hook.on_failure(event).await {
                warn!(index = item.index, error = %e, "batch: failure hook error ignored");
            }
        }

        match self.retry.decide(item.attempt) {
            RetryDecision::Retry { next_attempt } => {
                self.stats.retried();
                let backoff = self.retry.remaining_delay(failed_at.elapsed());
                debug!(
                    index = item.index,
                    next_attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "batch: scheduling retry"
                );
                self.stream.retry(
                    WorkItem {
                        attempt: next_attempt,
                        ..item
                    },
                    Instant::now() + backoff,
                );
                true
            }
            RetryDecision::Record => {
                self.stats.failed();
                self.record(item.index, Outcome::Failed {
                    error,
                    attempts: item.attempt + 1,
                });
                self.stream.complete();
                true
            }
            RetryDecision::Abort => {
                self.stats.failed();
                let index = item.index;
                let won = self.stop.trip(Fault {
                    index,
                    attempts: item.attempt + 1,
                    error,
                });
                if won {
                    warn!(worker = id, index, "batch: retries exhausted, draining");
                }
                self.stream.close();
                false
            }
        }
    }

    fn record(&self, index: usize, outcome: Outcome<T, E>) {
        if !self.config.collect_results {
            return;
        }
        if let Some(cell) = self.results.get(index) {
            if cell.set(outcome).is_err() {
                warn!(index, "batch: outcome already recorded");
            }
        }
    }
}

/// Run `op` over `items` and return the outcomes in input order.
///
/// ```no_run
/// use fastbatch_core::{map, BatchOptions};
///
/// # async fn demo() -> Result<(), fastbatch_core::BatchError<std::io::Error>> {
/// let doubled = map(vec![1, 2, 3], |x| async move { Ok::<_, std::io::Error>(x * 2) }, BatchOptions::new().concurrency(2)).await?;
/// assert_eq!(doubled.len(), 3);
/// # Ok(())
/// # }
/// ```
pub async fn map<A, I, T, E, F, Fut>(
    items: I,
    op: F,
    options: BatchOptions,
) -> Result<Vec<Outcome<T, E>>, BatchError<E>>
where
    A: Clone,
    E: Display,
    I: IntoIterator<Item = A>,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    BatchExecutor::new(options).map(items, op).await
}

/// Run `op` over `items`, keeping only success or the fatal error.
pub async fn for_each<A, I, T, E, F, Fut>(
    items: I,
    op: F,
    options: BatchOptions,
) -> Result<(), BatchError<E>>
where
    A: Clone,
    E: Display,
    I: IntoIterator<Item = A>,
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    BatchExecutor::new(options).for_each(items, op).await
}
