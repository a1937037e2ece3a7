use std::{
    hint::black_box,
    time::{Duration, Instant},
};

use serde::Serialize;

pub const MULTIPLIER: f64 = 1.0001;

pub const PAGE_SIZE: usize = 4 * 1024;
pub const L1D_CACHE_SIZE: usize = 48 * 1024;
pub const L2_CACHE_SIZE: usize = 1280 * 1024;
pub const L3_CACHE_SIZE: usize = 24 * 1024 * 1024;

/// Sweeps per cache pass, independent of the iteration count.
pub const CACHE_REPEAT: usize = 1000;
/// Sweeps per page pass, independent of the iteration count.
pub const TLB_REPEAT: usize = 5;
/// Pages touched by one page pass of the companion workload.
pub const TLB_PAGES: usize = 4096;

/// Constant the pressure workloads multiply every element by.
const PRESSURE_FACTOR: u32 = 3;

/// Extra memory traffic the companion workload adds after the light
/// computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
pub enum Pressure {
    /// Sequential multiplications only
    #[default]
    Light,
    /// Full sweeps over a buffer twice the L3 size
    Cache,
    /// Full sweeps over separately allocated 4 KiB pages
    Tlb,
}

impl Pressure {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Cache => "cache",
            Self::Tlb => "tlb",
        }
    }

    pub const fn default_repeat(self) -> usize {
        match self {
            Self::Light => 0,
            Self::Cache => CACHE_REPEAT,
            Self::Tlb => TLB_REPEAT,
        }
    }
}

/// `n` sequential multiplications of an accumulator starting at 1.0.
pub fn light_computation(n: u64) -> f64 {
    let mut result = 1.0_f64;
    for _ in 0..n {
        result *= black_box(MULTIPLIER);
    }
    result
}

/// Runs [`light_computation`] and measures only its wall-clock time.
pub fn timed_light_computation(n: u64) -> (f64, Duration) {
    let begin = Instant::now();
    let result = black_box(light_computation(n));
    (result, begin.elapsed())
}

/// Outcome of one pressure pass. `elapsed` covers the sweeps only, not
/// allocation or initialization.
#[derive(Debug, Clone, Copy)]
pub struct Pass {
    pub checksum: u64,
    pub elapsed: Duration,
}

fn checksum<'a>(words: impl Iterator<Item = &'a u32>) -> u64 {
    words.fold(0_u64, |acc, &w| acc.wrapping_add(u64::from(w)))
}

/// Allocates `num_pages` separate page-sized buffers and multiplies every
/// word of every page `repeat` times.
#[allow(clippy::cast_possible_truncation)]
pub fn page_pass(page_size: usize, num_pages: usize, repeat: usize) -> Pass {
    let words = page_size / std::mem::size_of::<u32>();
    let mut pages: Vec<Vec<u32>> = (0..num_pages)
        .map(|i| (0..words).map(|j| (i + j) as u32).collect())
        .collect();

    let begin = Instant::now();
    for _ in 0..repeat {
        for page in &mut pages {
            for word in page.iter_mut() {
                *word = word.wrapping_mul(PRESSURE_FACTOR);
            }
        }
        black_box(&pages);
    }
    let elapsed = begin.elapsed();

    Pass {
        checksum: checksum(pages.iter().flatten()),
        elapsed,
    }
}

/// Multiplies every word of one contiguous `total_bytes` buffer `repeat`
/// times.
#[allow(clippy::cast_possible_truncation)]
pub fn cache_pass(total_bytes: usize, repeat: usize) -> Pass {
    let words = total_bytes / std::mem::size_of::<u32>();
    let mut buffer: Vec<u32> = (0..words).map(|i| i as u32).collect();

    let begin = Instant::now();
    for _ in 0..repeat {
        for word in &mut buffer {
            *word = word.wrapping_mul(PRESSURE_FACTOR);
        }
        black_box(&buffer);
    }
    let elapsed = begin.elapsed();

    Pass {
        checksum: checksum(buffer.iter()),
        elapsed,
    }
}

/// One companion run: the light computation, then the pressure pass
/// repeated `repeat` times over its fixed working set.
pub fn run(iterations: u64, pressure: Pressure, repeat: usize) -> u64 {
    black_box(light_computation(iterations));
    match pressure {
        Pressure::Light => 0,
        Pressure::Cache => cache_pass(2 * L3_CACHE_SIZE, repeat).checksum,
        Pressure::Tlb => page_pass(PAGE_SIZE, TLB_PAGES, repeat).checksum,
    }
}
