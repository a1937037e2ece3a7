use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{
    metrics::Variant,
    profiler::PerfStat,
    report::{CsvOutput, JsonOutput, OutputStrategy, TextOutput},
    workload::Pressure,
};

pub const DEFAULT_TRIALS: u32 = 5;
pub const DEFAULT_ITERATIONS: u64 = 1_000_000;
pub const DEFAULT_PROGRAM: &str = "./computation_program";
pub const DEFAULT_PERF: &str = "perf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Csv,
    Json,
}

/// Repeatedly sample a workload with `perf stat` and report mean TMA metrics.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(version)]
pub struct Config {
    /// Metric set to request
    #[arg(long, value_enum, default_value_t = Variant::CacheLatency)]
    pub variant: Variant,

    /// Workload executable, run as `<program> <iterations>`
    #[arg(long, default_value = DEFAULT_PROGRAM)]
    pub program: PathBuf,

    /// Sampling tool
    #[arg(long, default_value = DEFAULT_PERF)]
    pub perf: PathBuf,

    /// Extra memory pressure the workload adds, forwarded as `--pressure`
    #[arg(long, value_enum, default_value_t = Pressure::Light)]
    pub pressure: Pressure,

    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: u64,

    #[arg(short, long, default_value_t = DEFAULT_TRIALS,
          value_parser = clap::value_parser!(u32).range(1..))]
    pub trials: u32,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            program: PathBuf::from(DEFAULT_PROGRAM),
            perf: PathBuf::from(DEFAULT_PERF),
            pressure: Pressure::default(),
            iterations: DEFAULT_ITERATIONS,
            trials: DEFAULT_TRIALS,
            format: Format::default(),
        }
    }
}

impl Config {
    pub fn profiler(&self) -> PerfStat {
        PerfStat::new(&self.perf, &self.program, self.variant).with_pressure(self.pressure)
    }

    pub fn output(&self) -> Box<dyn OutputStrategy> {
        match self.format {
            Format::Text => Box::new(TextOutput),
            Format::Json => Box::new(JsonOutput),
            Format::Csv => Box::new(CsvOutput {
                params: vec![
                    ("variant".to_owned(), self.variant.name().to_owned()),
                    ("pressure".to_owned(), self.pressure.name().to_owned()),
                    ("iterations".to_owned(), self.iterations.to_string()),
                ],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_parsed_defaults() {
        let parsed = Config::try_parse_from(["tmastat"]).unwrap();
        assert_eq!(parsed, Config::default());
        assert_eq!(parsed.trials, 5);
        assert_eq!(parsed.iterations, 1_000_000);
    }

    #[test]
    fn parses_flags() {
        let parsed = Config::try_parse_from([
            "tmastat",
            "--variant",
            "tlb",
            "--program",
            "/tmp/work",
            "-n",
            "42",
            "-t",
            "3",
            "--format",
            "json",
            "--pressure",
            "tlb",
        ])
        .unwrap();
        assert_eq!(parsed.variant, Variant::Tlb);
        assert_eq!(parsed.program, PathBuf::from("/tmp/work"));
        assert_eq!(parsed.iterations, 42);
        assert_eq!(parsed.trials, 3);
        assert_eq!(parsed.format, Format::Json);
        assert_eq!(parsed.pressure, Pressure::Tlb);
        let args: Vec<_> = parsed
            .profiler()
            .command(parsed.iterations)
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[args.len() - 2..], ["--pressure", "tlb"]);
    }

    #[test]
    fn zero_trials_rejected() {
        assert!(Config::try_parse_from(["tmastat", "--trials", "0"]).is_err());
    }

    #[test]
    fn cache_variant_is_spelled_cache() {
        assert!(Config::try_parse_from(["tmastat", "--variant", "cache"]).is_ok());
        assert!(Config::try_parse_from(["tmastat", "--variant", "cache-latency"]).is_err());
    }
}
