//! freqfold CLI: count keys into sorted runs, or merge runs into one frequency table.

use anyhow::Result;
use clap::Parser;
use freqfold::engine::arg_parser::Cli;
use freqfold::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
