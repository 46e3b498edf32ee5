//! fastbatch CLI — exercise the batch executor from the terminal.
//!
//! Usage:
//! ```bash
//! # Run 50 random sleeps (up to 1.5s) 10 at a time, at most 10 per second
//! fastbatch bench --items 50 --concurrency 10 --window-ms 1000
//!
//! # Same, with options loaded from a JSON file
//! fastbatch bench --config options.json
//!
//! # Validate an options file and print it normalised
//! fastbatch options --config options.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fastbatch_core::BatchOptions;

mod bench;
mod logging;

use logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "fastbatch",
    about = "Bounded-concurrency batch executor — fastbatch CLI",
    version
)]
struct Cli {
    /// Log executor activity (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the executor against sequential fixed-size batches
    Bench(BenchArgs),

    /// Validate a JSON options file and print the normalised options
    Options {
        /// Path to the options file
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct BenchArgs {
    /// JSON options file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of simulated items
    #[arg(long, default_value_t = 50)]
    items: usize,
    /// Upper bound of each item's random sleep
    #[arg(long, default_value_t = 1_500)]
    max_delay_ms: u64,
    /// Probability that an attempt fails (0.0 – 1.0)
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,
    /// Seed for the random durations
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Maximum items in flight
    #[arg(long)]
    concurrency: Option<usize>,
    /// Retries per item
    #[arg(long)]
    retry: Option<u32>,
    /// Delay between a failure and its retry
    #[arg(long)]
    retry_delay_ms: Option<u64>,
    /// Record exhausted items instead of aborting
    #[arg(long)]
    ignore_failures: bool,
    /// Sliding rate-limit window
    #[arg(long)]
    window_ms: Option<u64>,
    /// Dispatches allowed per window (default: concurrency)
    #[arg(long)]
    rate_limit: Option<usize>,
    /// Log every failed attempt at warn level
    #[arg(long)]
    log_failures: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl BenchArgs {
    fn options(&self) -> Result<BatchOptions> {
        let mut options = match &self.config {
            Some(path) => load_options(path)?,
            None => BatchOptions::default(),
        };
        if let Some(n) = self.concurrency {
            options.concurrency = Some(n);
        }
        if let Some(n) = self.retry {
            options.max_retries = n;
        }
        if let Some(ms) = self.retry_delay_ms {
            options.retry_delay_ms = ms;
        }
        if self.ignore_failures {
            options.ignore_failures = true;
        }
        if let Some(ms) = self.window_ms {
            options.rate_window_ms = Some(ms);
        }
        if let Some(n) = self.rate_limit {
            options.rate_limit = Some(n);
        }
        if self.log_failures {
            options.log_failures = true;
        }
        options.validate()?;
        Ok(options)
    }
}

fn load_options(path: &Path) -> Result<BatchOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read options file {}", path.display()))?;
    BatchOptions::from_json(&text)
        .with_context(|| format!("invalid options file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_tracing(&LogConfig::from_verbosity(cli.verbose, cli.log_json));

    match cli.command {
        Commands::Bench(args) => cmd_bench(args).await,
        Commands::Options { config } => cmd_options(&config),
    }
}

async fn cmd_bench(args: BenchArgs) -> Result<()> {
    let options = args.options()?;
    let params = bench::BenchParams {
        items: args.items,
        max_delay_ms: args.max_delay_ms,
        failure_rate: args.failure_rate,
        seed: args.seed,
        options,
    };
    let report = bench::run(params).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Items:               {}", report.items);
    println!("Chunk size:          {}", report.chunk_size);
    println!("Executor:            {}ms", report.executor_ms);
    println!("Chunked (shuffled):  {}ms", report.chunked_shuffled_ms);
    println!("Chunked (sorted):    {}ms", report.chunked_sorted_ms);
    println!(
        "Dispatched:          {} ({} retries)",
        report.stats.dispatched, report.stats.retried
    );
    println!("Failed items:        {}", report.failed_items);
    Ok(())
}

fn cmd_options(path: &Path) -> Result<()> {
    let options = load_options(path)?;
    println!("{}", serde_json::to_string_pretty(&options)?);
    Ok(())
}
