use std::collections::HashMap;

use crate::metrics::{Metric, MetricKind};

/// Why a metric fell back to its default value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractFailure {
    /// No output line carries the metric identifier.
    Missing { event: &'static str },
    /// The line was found but holds no parseable value.
    Malformed { event: &'static str, line: String },
}

impl ExtractFailure {
    pub const fn event(&self) -> &'static str {
        match self {
            Self::Missing { event } | Self::Malformed { event, .. } => event,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    values: HashMap<&'static str, f64>,
    pub failures: Vec<ExtractFailure>,
}

impl Extraction {
    /// Value for `event`, 0 for anything that was not extracted.
    pub fn get(&self, event: &str) -> f64 {
        self.values.get(event).copied().unwrap_or(0.0)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pulls every metric in `metrics` out of captured `perf stat` text.
///
/// A line belongs to a metric when one of its whitespace fields equals the
/// identifier; the first such line wins. The value is the first field left
/// after dropping the identifier and `#` markers, so both
/// `1,234  tma_x  # ...` and `tma_x 1,234 unit` parse. Anything missing or
/// unparseable is logged and defaults to zero.
pub fn extract(text: &str, metrics: &[Metric]) -> Extraction {
    let mut extraction = Extraction::default();
    for metric in metrics {
        let line = text
            .lines()
            .find(|line| line.split_whitespace().any(|field| field == metric.event));

        let value = match line {
            None => {
                log::warn!("Could not find {} in sampling output", metric.label);
                extraction
                    .failures
                    .push(ExtractFailure::Missing { event: metric.event });
                0.0
            }
            Some(line) => match parse_value(line, metric) {
                Some(value) => value,
                None => {
                    log::warn!("Could not parse {} from line: {}", metric.label, line.trim());
                    extraction.failures.push(ExtractFailure::Malformed {
                        event: metric.event,
                        line: line.to_owned(),
                    });
                    0.0
                }
            },
        };
        extraction.values.insert(metric.event, value);
    }
    extraction
}

fn parse_value(line: &str, metric: &Metric) -> Option<f64> {
    let token = line
        .split_whitespace()
        .find(|&field| field != metric.event && field != "#")?;
    parse_number(token, metric.kind)
}

/// Parses a decimal literal of the given kind, ignoring `,` grouping.
/// Counts accept an optional sign.
pub fn parse_number(token: &str, kind: MetricKind) -> Option<f64> {
    let digits = token.replace(',', "");
    match kind {
        #[allow(clippy::cast_precision_loss)]
        MetricKind::Count => digits.parse::<i64>().ok().map(|v| v as f64),
        MetricKind::Latency => digits.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}
