//! Repeated `perf stat` sampling of a workload, with mean TMA cache-latency
//! and TLB-miss metrics across trials.
//!
//! A run times the built-in light computation, samples the external
//! workload with the sampling tool, extracts the requested metrics from its
//! output and folds everything into an [`Aggregate`]. The [`Summary`] of
//! that aggregate is what gets reported.
#![warn(
    clippy::all,
    clippy::perf,
    clippy::pedantic,
    clippy::nursery,
    //clippy::cargo
)]
#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod aggregate;
pub mod config;
pub mod counters;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod profiler;
pub mod report;
pub mod sweep;
pub mod workload;

use std::io::Write;

pub use aggregate::{run_trial, run_trials, Aggregate, Series, Trial};
pub use config::Config;
pub use error::{Error, Result};
pub use metrics::{Metric, MetricKind, Variant};
pub use profiler::{PerfStat, Profiler};
pub use report::Summary;

/// Runs every trial `config` asks for and writes the report to `out`.
pub fn run(config: &Config, out: &mut dyn Write) -> Result<Summary> {
    run_with(&config.profiler(), config, out)
}

/// As [`run`], sampling through `profiler` instead of `perf stat`.
pub fn run_with<P: Profiler + ?Sized>(
    profiler: &P,
    config: &Config,
    out: &mut dyn Write,
) -> Result<Summary> {
    log::info!(
        "{} trials of {} iterations, {} metrics",
        config.trials,
        config.iterations,
        config.variant.name()
    );
    let aggregate = run_trials(
        profiler,
        config.variant.metrics(),
        config.iterations,
        config.trials,
    )?;
    let summary = Summary::from(&aggregate);
    report::report(&summary, &*config.output(), out)?;
    Ok(summary)
}
