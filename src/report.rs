use std::io::Write;

use serde::Serialize;

use crate::{aggregate::Aggregate, error::Result};

pub const EXECUTION_TIME_LABEL: &str = "Execution Time";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricMean {
    pub event: &'static str,
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub mean: Option<f64>,
}

/// Means over every series of an [`Aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub trials: usize,
    pub degraded_trials: usize,
    pub metrics: Vec<MetricMean>,
    pub execution_time: Option<f64>,
}

impl From<&Aggregate> for Summary {
    fn from(aggregate: &Aggregate) -> Self {
        Self {
            trials: aggregate.trials(),
            degraded_trials: aggregate.degraded_trials(),
            metrics: aggregate
                .series()
                .map(|(metric, series)| MetricMean {
                    event: metric.event,
                    label: metric.label,
                    unit: metric.kind.unit(),
                    mean: series.mean(),
                })
                .collect(),
            execution_time: aggregate.execution_time().mean(),
        }
    }
}

impl Summary {
    /// Label, mean and unit for every line of the report, execution time last.
    pub fn rows(
        &self,
    ) -> impl Iterator<Item = (&'static str, Option<f64>, Option<&'static str>)> + '_ {
        self.metrics
            .iter()
            .map(|m| (m.label, m.mean, m.unit))
            .chain(std::iter::once((
                EXECUTION_TIME_LABEL,
                self.execution_time,
                Some("seconds"),
            )))
    }
}

/// Shortest form that reads back as the same `f64`, always with a decimal
/// point (`160.0`, `0.0013`).
pub fn format_mean(mean: f64) -> String {
    format!("{mean:?}")
}

pub trait OutputStrategy {
    fn output_report(&self, summary: &Summary, out: &mut dyn Write) -> Result<()>;
}

/// `Average <label>: <mean> <unit>` per metric.
pub struct TextOutput;

impl OutputStrategy for TextOutput {
    fn output_report(&self, summary: &Summary, out: &mut dyn Write) -> Result<()> {
        for (label, mean, unit) in summary.rows() {
            let mean = mean.map_or_else(|| "n/a".to_owned(), format_mean);
            match unit {
                Some(unit) => writeln!(out, "Average {label}: {mean} {unit}")?,
                None => writeln!(out, "Average {label}: {mean}")?,
            }
        }
        Ok(())
    }
}

/// Aligned header and data rows, benchmark parameters first.
pub struct CsvOutput {
    pub params: Vec<(String, String)>,
}

/// Appends one aligned column to a CSV header/data row pair.
pub(crate) fn push_column(
    header_out: &mut String,
    data_out: &mut String,
    name: &str,
    value: &str,
    add_comma: bool,
) {
    let width = name.len().max(value.len());
    let comma = if add_comma { "," } else { "" };
    header_out.push_str(&format!("{name:width$}{comma}"));
    data_out.push_str(&format!("{value:>width$}{comma}"));
}

impl OutputStrategy for CsvOutput {
    fn output_report(&self, summary: &Summary, out: &mut dyn Write) -> Result<()> {
        let mut header = String::new();
        let mut data = String::new();
        for (name, value) in &self.params {
            push_column(&mut header, &mut data, name, value, true);
        }
        push_column(&mut header, &mut data, "trials", &summary.trials.to_string(), true);
        let rows: Vec<_> = summary.rows().collect();
        for (i, (label, mean, _)) in rows.iter().enumerate() {
            let value = mean.map_or_else(String::new, format_mean);
            push_column(&mut header, &mut data, label, &value, i + 1 < rows.len());
        }
        writeln!(out, "{header}")?;
        writeln!(out, "{data}")?;
        Ok(())
    }
}

pub struct JsonOutput;

impl OutputStrategy for JsonOutput {
    fn output_report(&self, summary: &Summary, out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, summary)?;
        writeln!(out)?;
        Ok(())
    }
}

/// Writes `summary` with `strategy` and flags degraded trials in the log.
pub fn report(summary: &Summary, strategy: &dyn OutputStrategy, out: &mut dyn Write) -> Result<()> {
    if summary.degraded_trials > 0 {
        log::warn!(
            "{} of {} trials had metrics substituted with 0; means include them",
            summary.degraded_trials,
            summary.trials
        );
    }
    strategy.output_report(summary, out)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        aggregate::Trial,
        metrics::{CACHE_LATENCY, TLB_MISSES},
    };

    fn cache_summary() -> Summary {
        let trials = [
            vec![100.0, 200.0, 300.0],
            vec![100.0, 0.0, 300.0],
        ];
        let aggregate = trials.iter().fold(Aggregate::new(CACHE_LATENCY), |agg, values| {
            agg.record(&Trial {
                values: values.clone(),
                elapsed: Duration::from_millis(500),
                degraded: vec![],
            })
        });
        Summary::from(&aggregate)
    }

    fn render(strategy: &dyn OutputStrategy, summary: &Summary) -> String {
        let mut out = Vec::new();
        report(summary, strategy, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn text_lines() {
        let text = render(&TextOutput, &cache_summary());
        assert_eq!(
            text,
            "Average L1 Miss Latency: 100.0 core cycles\n\
             Average L2 Miss Latency: 100.0 core cycles\n\
             Average L3 Miss Latency: 300.0 core cycles\n\
             Average Execution Time: 0.5 seconds\n"
        );
    }

    #[test]
    fn tlb_has_six_unitless_lines() {
        let aggregate = Aggregate::new(TLB_MISSES).record(&Trial {
            values: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            elapsed: Duration::ZERO,
            degraded: vec![],
        });
        let text = render(&TextOutput, &Summary::from(&aggregate));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Average ITLB Misses: 1.0");
        assert_eq!(lines[5], "Average Execution Time: 0.0 seconds");
    }

    #[test]
    fn short_runs_keep_full_precision() {
        let aggregate = Aggregate::new(CACHE_LATENCY).record(&Trial {
            values: vec![45.215, 160.0, 0.0],
            elapsed: Duration::from_micros(1300),
            degraded: vec![],
        });
        let summary = Summary::from(&aggregate);
        let text = render(&TextOutput, &summary);
        assert!(text.contains("Average L1 Miss Latency: 45.215 core cycles\n"));
        assert!(text.contains("Average Execution Time: 0.0013 seconds\n"));

        let csv = render(&CsvOutput { params: vec![] }, &summary);
        assert!(csv.lines().nth(1).unwrap().trim_end().ends_with("0.0013"));
    }

    #[test]
    fn empty_means_are_marked() {
        let summary = Summary::from(&Aggregate::new(TLB_MISSES));
        let text = render(&TextOutput, &summary);
        assert!(text.starts_with("Average ITLB Misses: n/a\n"));
    }

    #[test]
    fn csv_rows_align() {
        let csv = CsvOutput {
            params: vec![("variant".to_owned(), "cache".to_owned())],
        };
        let text = render(&csv, &cache_summary());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), lines[1].len());
        assert!(lines[0].starts_with("variant,trials,L1 Miss Latency,"));
        assert!(lines[1].starts_with("  cache,     2,"));
        assert!(lines[1].trim_end().ends_with("0.5"));
    }

    #[test]
    fn json_round_trips_fields() {
        let text = render(&JsonOutput, &cache_summary());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["trials"], 2);
        assert_eq!(value["metrics"][1]["label"], "L2 Miss Latency");
        assert_eq!(value["metrics"][1]["mean"], 100.0);
        assert_eq!(value["execution_time"], 0.5);
    }
}
