use std::time::Duration;

use serde::Serialize;

use crate::{
    error::Result,
    extract::extract,
    metrics::Metric,
    profiler::Profiler,
    workload,
};

/// One workload + sampling + extraction run.
#[derive(Debug, Clone)]
pub struct Trial {
    /// Extracted values in the order of the requested metrics.
    pub values: Vec<f64>,
    pub elapsed: Duration,
    /// Identifiers of metrics that fell back to zero in this trial.
    pub degraded: Vec<&'static str>,
}

impl Trial {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Per-trial values of one metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series(Vec<f64>);

impl Series {
    pub fn push(&mut self, value: f64) {
        self.0.push(value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Arithmetic mean, `None` for an empty series.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        if self.0.is_empty() {
            return None;
        }
        Some(self.0.iter().sum::<f64>() / self.0.len() as f64)
    }
}

impl FromIterator<f64> for Series {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Series for every metric plus execution time, all of equal length.
#[derive(Debug, Clone)]
pub struct Aggregate {
    metrics: &'static [Metric],
    series: Vec<Series>,
    execution_time: Series,
    degraded_trials: usize,
}

impl Aggregate {
    pub fn new(metrics: &'static [Metric]) -> Self {
        Self {
            metrics,
            series: vec![Series::default(); metrics.len()],
            execution_time: Series::default(),
            degraded_trials: 0,
        }
    }

    /// Folds one trial in, appending exactly one value to every series.
    pub fn record(mut self, trial: &Trial) -> Self {
        for (i, series) in self.series.iter_mut().enumerate() {
            series.push(trial.values.get(i).copied().unwrap_or(0.0));
        }
        self.execution_time.push(trial.elapsed.as_secs_f64());
        if trial.is_degraded() {
            self.degraded_trials += 1;
        }
        self
    }

    pub const fn metrics(&self) -> &'static [Metric] {
        self.metrics
    }

    pub fn series(&self) -> impl Iterator<Item = (&Metric, &Series)> {
        self.metrics.iter().zip(&self.series)
    }

    pub const fn execution_time(&self) -> &Series {
        &self.execution_time
    }

    pub fn trials(&self) -> usize {
        self.execution_time.len()
    }

    pub const fn degraded_trials(&self) -> usize {
        self.degraded_trials
    }
}

/// Times the workload, then samples the external program and extracts
/// `metrics` from its output.
pub fn run_trial<P: Profiler + ?Sized>(
    profiler: &P,
    metrics: &'static [Metric],
    iterations: u64,
) -> Result<Trial> {
    let (_, elapsed) = workload::timed_light_computation(iterations);
    let text = profiler.profile(iterations)?;
    let extraction = extract(&text, metrics);
    Ok(Trial {
        values: metrics.iter().map(|m| extraction.get(m.event)).collect(),
        elapsed,
        degraded: extraction.failures.iter().map(|f| f.event()).collect(),
    })
}

pub fn run_trials<P: Profiler + ?Sized>(
    profiler: &P,
    metrics: &'static [Metric],
    iterations: u64,
    trials: u32,
) -> Result<Aggregate> {
    (0..trials).try_fold(Aggregate::new(metrics), |aggregate, n| {
        let trial = run_trial(profiler, metrics, iterations)?;
        log::info!(
            "trial {}/{trials}: {:.6}s{}",
            n + 1,
            trial.elapsed.as_secs_f64(),
            if trial.is_degraded() { " (degraded)" } else { "" }
        );
        Ok(aggregate.record(&trial))
    })
}
