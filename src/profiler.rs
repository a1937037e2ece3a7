use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

use crate::{
    error::{Error, Result},
    metrics::Variant,
    workload::Pressure,
};

/// Source of sampling output for one trial.
pub trait Profiler {
    /// Runs the workload under the sampler and returns its diagnostic text.
    fn profile(&self, iterations: u64) -> Result<String>;
}

/// `perf stat -e <events> <program> <iterations> [--pressure <kind>]`.
#[derive(Debug, Clone)]
pub struct PerfStat {
    perf: PathBuf,
    program: PathBuf,
    events: String,
    pressure: Pressure,
}

impl PerfStat {
    pub fn new(perf: impl Into<PathBuf>, program: impl Into<PathBuf>, variant: Variant) -> Self {
        Self {
            perf: perf.into(),
            program: program.into(),
            events: variant.event_list(),
            pressure: Pressure::Light,
        }
    }

    /// Asks the workload for extra memory pressure; `Light` keeps the
    /// iteration count as its only argument.
    #[must_use]
    pub fn with_pressure(mut self, pressure: Pressure) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn command(&self, iterations: u64) -> Command {
        let mut command = Command::new(&self.perf);
        command
            .arg("stat")
            .arg("-e")
            .arg(&self.events)
            .arg(&self.program)
            .arg(iterations.to_string());
        if self.pressure != Pressure::Light {
            command.arg("--pressure").arg(self.pressure.name());
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl Profiler for PerfStat {
    fn profile(&self, iterations: u64) -> Result<String> {
        log::debug!(
            "running {} stat -e {} {} {iterations}",
            self.perf.display(),
            self.events,
            self.program.display()
        );
        let output = self
            .command(iterations)
            .output()
            .map_err(|source| Error::Spawn {
                program: self.perf.display().to_string(),
                source,
            })?;
        if !output.status.success() {
            log::warn!(
                "{} exited with {}, metrics for this trial may be missing",
                self.perf.display(),
                output.status
            );
        }
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}
