use std::hint::black_box;

use clap::Parser;
use tmastat::{
    counters::CounterBlock,
    workload::{self, Pressure},
};

/// Workload sampled by `tmastat`.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    iterations: u64,

    #[arg(long, value_enum, default_value_t = Pressure::Light)]
    pressure: Pressure,

    /// Sweeps per pressure pass [default: 1000 for cache, 5 for tlb]
    #[arg(long)]
    repeat: Option<usize>,

    /// Print in-process hardware counters as CSV when done
    #[arg(long)]
    counters: bool,
}

#[allow(clippy::cast_precision_loss)]
fn main() -> Result<(), tmastat::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let repeat = args.repeat.unwrap_or_else(|| args.pressure.default_repeat());
    if args.counters {
        let params = vec![
            ("pressure".to_owned(), args.pressure.name().to_owned()),
            ("iterations".to_owned(), args.iterations.to_string()),
        ];
        let _block = CounterBlock::new(params, args.iterations.max(1) as f64)?;
        black_box(workload::run(args.iterations, args.pressure, repeat));
    } else {
        black_box(workload::run(args.iterations, args.pressure, repeat));
    }
    Ok(())
}
