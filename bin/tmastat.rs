use std::io::{stdout, BufWriter, Write};

use clap::Parser;
use tmastat::Config;

fn main() -> Result<(), tmastat::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = Config::parse();
    let mut out = BufWriter::new(stdout().lock());
    tmastat::run(&config, &mut out)?;
    out.flush()?;
    Ok(())
}
