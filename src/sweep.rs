//! Working-set size sweeps: time a pressure pass at growing sizes and write
//! one CSV row per size.

use std::{io::Write, time::Duration};

use crate::{
    error::Result,
    workload::{cache_pass, page_pass, L1D_CACHE_SIZE, L2_CACHE_SIZE, L3_CACHE_SIZE},
};

pub const CACHE_LEVELS: &[(&str, usize)] = &[
    ("L1 Cache", L1D_CACHE_SIZE),
    ("L2 Cache", L2_CACHE_SIZE),
    ("L3 Cache", L3_CACHE_SIZE),
];

pub const PAGE_STEP: usize = 500;
pub const MAX_PAGES: usize = 100_000;

/// Quarter steps from `total / 4` up to twice `total`.
pub fn cache_sizes(total: usize) -> impl Iterator<Item = usize> {
    let step = total / 4;
    (1..)
        .map(move |k| k * step)
        .take_while(move |&size| step > 0 && size <= 2 * total)
}

/// `step, 2 * step, ...` up to and including `max`.
pub fn page_counts(step: usize, max: usize) -> impl Iterator<Item = usize> {
    (step.max(1)..=max)
        .step_by(step.max(1))
        .filter(move |_| step > 0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheRow {
    pub level: &'static str,
    pub bytes: usize,
    pub latency: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRow {
    pub pages: usize,
    pub latency: Duration,
}

pub fn cache_sweep(levels: &[(&'static str, usize)], repeat: usize) -> Vec<CacheRow> {
    let mut rows = Vec::new();
    for &(level, total) in levels {
        log::info!("Testing {level}");
        for bytes in cache_sizes(total) {
            let pass = cache_pass(bytes, repeat);
            rows.push(CacheRow {
                level,
                bytes,
                latency: pass.elapsed,
            });
        }
    }
    rows
}

pub fn page_sweep(page_size: usize, step: usize, max: usize, repeat: usize) -> Vec<PageRow> {
    page_counts(step, max)
        .map(|pages| {
            log::debug!("{pages} pages");
            PageRow {
                pages,
                latency: page_pass(page_size, pages, repeat).elapsed,
            }
        })
        .collect()
}

pub fn write_cache_csv(rows: &[CacheRow], out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Cache Level, Total Size (bytes), Latency (seconds)")?;
    for row in rows {
        writeln!(
            out,
            "{}, {}, {:.9}",
            row.level,
            row.bytes,
            row.latency.as_secs_f64()
        )?;
    }
    Ok(())
}

pub fn write_page_csv(rows: &[PageRow], out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Number of Pages, Latency (seconds)")?;
    for row in rows {
        writeln!(out, "{}, {:.9}", row.pages, row.latency.as_secs_f64())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_sizes_quarter_steps() {
        let sizes: Vec<_> = cache_sizes(L1D_CACHE_SIZE).collect();
        assert_eq!(sizes.len(), 8);
        assert_eq!(sizes[0], 12 * 1024);
        assert_eq!(sizes[7], 96 * 1024);
        assert_eq!(cache_sizes(3).count(), 0);
    }

    #[test]
    fn page_counts_inclusive() {
        let counts: Vec<_> = page_counts(PAGE_STEP, 1500).collect();
        assert_eq!(counts, [500, 1000, 1500]);
        assert_eq!(page_counts(PAGE_STEP, MAX_PAGES).count(), 200);
        assert_eq!(page_counts(0, 10).count(), 0);
    }

    #[test]
    fn cache_sweep_rows_per_level() {
        let rows = cache_sweep(&[("tiny", 64), ("small", 256)], 1);
        assert_eq!(rows.len(), 16);
        assert_eq!(rows[0].level, "tiny");
        assert_eq!(rows[0].bytes, 16);
        assert_eq!(rows[15].level, "small");
        assert_eq!(rows[15].bytes, 512);
    }

    #[test]
    fn page_sweep_rows() {
        let rows = page_sweep(64, 2, 6, 1);
        let pages: Vec<_> = rows.iter().map(|r| r.pages).collect();
        assert_eq!(pages, [2, 4, 6]);
    }

    #[test]
    fn csv_layout() {
        let mut out = Vec::new();
        let rows = [CacheRow {
            level: "L1 Cache",
            bytes: 12_288,
            latency: Duration::from_micros(1300),
        }];
        write_cache_csv(&rows, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Cache Level, Total Size (bytes), Latency (seconds)\n\
             L1 Cache, 12288, 0.001300000\n"
        );

        let mut out = Vec::new();
        let rows = [PageRow {
            pages: 500,
            latency: Duration::from_nanos(42),
        }];
        write_page_csv(&rows, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Number of Pages, Latency (seconds)\n500, 0.000000042\n"
        );
    }
}
