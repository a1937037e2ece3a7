use serde::Serialize;

/// How a metric's value token is parsed and which unit it is reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricKind {
    /// Unitless event count, parsed as a signed integer.
    Count,
    /// Latency in core cycles, parsed as floating point.
    Latency,
}

impl MetricKind {
    pub const fn unit(self) -> Option<&'static str> {
        match self {
            Self::Count => None,
            Self::Latency => Some("core cycles"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metric {
    /// Identifier passed to `perf stat -e` and searched for in its output.
    pub event: &'static str,
    pub label: &'static str,
    pub kind: MetricKind,
}

impl Metric {
    pub const fn new(event: &'static str, label: &'static str, kind: MetricKind) -> Self {
        Self { event, label, kind }
    }
}

pub const CACHE_LATENCY: &[Metric] = &[
    Metric::new(
        "tma_info_memory_load_miss_real_latency",
        "L1 Miss Latency",
        MetricKind::Latency,
    ),
    Metric::new(
        "tma_info_memory_oro_load_l2_miss_latency",
        "L2 Miss Latency",
        MetricKind::Latency,
    ),
    Metric::new(
        "tma_info_memory_oro_load_l3_miss_latency",
        "L3 Miss Latency",
        MetricKind::Latency,
    ),
];

pub const TLB_MISSES: &[Metric] = &[
    Metric::new("tma_itlb_misses", "ITLB Misses", MetricKind::Count),
    Metric::new("tma_dtlb_load", "DTLB Load Misses", MetricKind::Count),
    Metric::new("tma_dtlb_store", "DTLB Store Misses", MetricKind::Count),
    Metric::new("tma_load_stlb_miss", "STLB Load Misses", MetricKind::Count),
    Metric::new("tma_store_stlb_miss", "STLB Store Misses", MetricKind::Count),
];

/// Which fixed metric set a run requests from the sampling tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
pub enum Variant {
    #[default]
    #[value(name = "cache")]
    CacheLatency,
    Tlb,
}

impl Variant {
    pub const fn metrics(self) -> &'static [Metric] {
        match self {
            Self::CacheLatency => CACHE_LATENCY,
            Self::Tlb => TLB_MISSES,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::CacheLatency => "cache",
            Self::Tlb => "tlb",
        }
    }

    /// Comma separated identifiers for `perf stat -e`.
    pub fn event_list(self) -> String {
        self.metrics()
            .iter()
            .map(|m| m.event)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_lists() {
        assert_eq!(
            Variant::CacheLatency.event_list(),
            "tma_info_memory_load_miss_real_latency,\
             tma_info_memory_oro_load_l2_miss_latency,\
             tma_info_memory_oro_load_l3_miss_latency"
        );
        assert_eq!(
            Variant::Tlb.event_list(),
            "tma_itlb_misses,tma_dtlb_load,tma_dtlb_store,tma_load_stlb_miss,tma_store_stlb_miss"
        );
    }

    #[test]
    fn kinds_per_variant() {
        assert!(Variant::CacheLatency
            .metrics()
            .iter()
            .all(|m| m.kind == MetricKind::Latency));
        assert!(Variant::Tlb
            .metrics()
            .iter()
            .all(|m| m.kind == MetricKind::Count));
        assert_eq!(MetricKind::Latency.unit(), Some("core cycles"));
        assert_eq!(MetricKind::Count.unit(), None);
    }
}
