//! Tracing subscriber setup.
//!
//! Events go to stderr, so stdout carries only banners and dataset rows.
//! With a log directory, a JSON copy of every event is also written there
//! through a non-blocking appender; the returned guard must stay alive
//! until the process exits or buffered lines are lost.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (_, true) => Verbosity::Quiet,
            (true, false) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        }
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn default_directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "adaptflow=error",
            Verbosity::Normal => "adaptflow=info",
            Verbosity::Verbose => "adaptflow=debug",
        }
    }
}

fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.default_directive()))
}

/// Log file name for this process. Ranks of one parallel job share the
/// directory, so the pid keeps their files apart.
pub fn log_file_name() -> String {
    format!("adaptflow-{}.log", std::process::id())
}

/// Install the global subscriber.
pub fn init(
    format: LogFormat,
    verbosity: Verbosity,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>> {
    let stderr_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Plain => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::never(dir, log_file_name());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(env_filter(verbosity))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
