use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use clap::{Parser, ValueEnum};
use tmastat::{
    sweep,
    workload::{Pressure, PAGE_SIZE},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    /// Buffer sizes around each cache level
    Cache,
    /// Growing numbers of 4 KiB pages
    Tlb,
}

/// Time a pressure pass over growing working sets and save one CSV row per size.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    #[arg(value_enum)]
    kind: Kind,

    /// Sweeps per size [default: 1000 for cache, 5 for tlb]
    #[arg(long)]
    repeat: Option<usize>,

    #[arg(long, default_value_t = sweep::PAGE_STEP)]
    page_step: usize,

    #[arg(long, default_value_t = sweep::MAX_PAGES)]
    max_pages: usize,

    /// CSV destination [default: cache_miss_vs_latency.csv or tlb_miss_vs_latency.csv]
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), tmastat::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let (pressure, default_out) = match args.kind {
        Kind::Cache => (Pressure::Cache, "cache_miss_vs_latency.csv"),
        Kind::Tlb => (Pressure::Tlb, "tlb_miss_vs_latency.csv"),
    };
    let repeat = args.repeat.unwrap_or_else(|| pressure.default_repeat());
    let path = args.out.unwrap_or_else(|| PathBuf::from(default_out));

    let mut out = BufWriter::new(File::create(&path)?);
    match args.kind {
        Kind::Cache => {
            let rows = sweep::cache_sweep(sweep::CACHE_LEVELS, repeat);
            sweep::write_cache_csv(&rows, &mut out)?;
        }
        Kind::Tlb => {
            let rows = sweep::page_sweep(PAGE_SIZE, args.page_step, args.max_pages, repeat);
            sweep::write_page_csv(&rows, &mut out)?;
        }
    }
    out.flush()?;
    log::info!("Data has been saved to {}", path.display());
    Ok(())
}
