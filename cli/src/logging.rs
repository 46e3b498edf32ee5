//! Subscriber setup for the `fastbatch` binary.
//!
//! Logs go to stderr so that `--json` reports on stdout stay machine-readable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CORE_TARGET: &str = "fastbatch-core";
const CLI_TARGET: &str = "fastbatch";

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter and format for the process-wide subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for every target without an override.
    #[serde(default = "default_level")]
    pub level: String,
    /// Target (crate name, dashes allowed) to level.
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            targets: BTreeMap::new(),
            format: LogFormat::Text,
        }
    }
}

impl LogConfig {
    /// `-v` raises the executor to `info`; `-vv` and up add per-dispatch
    /// `debug` events from both crates.
    pub fn from_verbosity(verbose: u8, json: bool) -> Self {
        let mut config = Self {
            format: if json { LogFormat::Json } else { LogFormat::Text },
            ..Self::default()
        };
        match verbose {
            0 => {}
            1 => {
                config.targets.insert(CORE_TARGET.into(), "info".into());
            }
            _ => {
                config.targets.insert(CORE_TARGET.into(), "debug".into());
                config.targets.insert(CLI_TARGET.into(), "debug".into());
            }
        }
        config
    }

    /// `EnvFilter` directive string, e.g. `"warn,fastbatch_core=debug"`.
    pub fn directives(&self) -> String {
        self.targets
            .iter()
            .fold(self.level.clone(), |mut acc, (target, level)| {
                acc.push_str(&format!(",{}={}", target.replace('-', "_"), level));
                acc
            })
    }
}

/// Install the global subscriber. A set `RUST_LOG` replaces the directives.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .unwrap_or_else(|_| EnvFilter::new(default_level()));

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}
