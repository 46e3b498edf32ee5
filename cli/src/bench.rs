//! `fastbatch bench` — compare the executor against fixed-size batches.
//!
//! Generates `items` random sleep durations, runs them through the executor,
//! then through sequential chunks of `concurrency` items (each chunk awaited
//! in full before the next starts), both shuffled and sorted by duration.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use fastbatch_core::{BatchExecutor, BatchOptions, BatchStats, FailureEvent, HookError};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;

/// Error returned by a simulated item.
#[derive(Debug, Error)]
#[error("simulated failure after {0}ms")]
pub struct SimulatedFailure(u64);

/// Parameters of one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchParams {
    pub items: usize,
    pub max_delay_ms: u64,
    pub failure_rate: f64,
    pub seed: u64,
    pub options: BatchOptions,
}

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub items: usize,
    pub chunk_size: usize,
    pub executor_ms: u64,
    pub chunked_shuffled_ms: u64,
    pub chunked_sorted_ms: u64,
    pub failed_items: usize,
    pub stats: BatchStats,
}

pub async fn run(params: BenchParams) -> Result<BenchReport> {
    params.options.validate()?;
    if !(0.0..=1.0).contains(&params.failure_rate) {
        bail!("failure rate must be within 0.0..=1.0, got {}", params.failure_rate);
    }
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut delays: Vec<u64> = (0..params.items)
        .map(|_| rng.gen_range(0..=params.max_delay_ms))
        .collect();
    delays.shuffle(&mut rng);
    let mut sorted = delays.clone();
    sorted.sort_unstable();

    let chunk_size = params
        .options
        .concurrency
        .unwrap_or(params.items)
        .clamp(1, params.items.max(1));

    let failure_rate = params.failure_rate;
    let rng = Mutex::new(rng);
    let exec = BatchExecutor::new(params.options.clone()).with_failure_hook(
        |event: &FailureEvent<'_, u64, SimulatedFailure>| -> Result<(), HookError> {
            tracing::info!(
                index = event.index,
                attempt = event.attempt,
                error = %event.error,
                "bench: item failed"
            );
            Ok(())
        },
    );

    let started = Instant::now();
    let (outcomes, stats) = exec
        .map_with_stats(delays.clone(), |ms| {
            let fail = failure_rate > 0.0
                && rng
                    .lock()
                    .map(|mut r| r.gen_bool(failure_rate))
                    .unwrap_or(false);
            async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                if fail {
                    Err(SimulatedFailure(ms))
                } else {
                    Ok(ms)
                }
            }
        })
        .await?;
    let executor_ms = started.elapsed().as_millis() as u64;
    let failed_items = outcomes.iter().filter(|o| !o.is_success()).count();

    let chunked_shuffled_ms = chunked(&delays, chunk_size).await;
    let chunked_sorted_ms = chunked(&sorted, chunk_size).await;

    Ok(BenchReport {
        items: params.items,
        chunk_size,
        executor_ms,
        chunked_shuffled_ms,
        chunked_sorted_ms,
        failed_items,
        stats,
    })
}

/// Await each chunk of sleeps in full before starting the next.
async fn chunked(delays: &[u64], chunk_size: usize) -> u64 {
    let started = Instant::now();
    for chunk in delays.chunks(chunk_size) {
        join_all(
            chunk
                .iter()
                .map(|ms| tokio::time::sleep(Duration::from_millis(*ms))),
        )
        .await;
    }
    started.elapsed().as_millis() as u64
}
