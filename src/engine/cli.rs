//! CLI dispatch: build options (defaults, then `freqfold.toml`, then flags) and run a command.

use anyhow::Result;
use log::debug;

use crate::Opts;
use crate::engine::arg_parser::{Cli, Commands};
use crate::engine::handlers::{handle_count, handle_merge};
use crate::utils::settings_toml::{apply_file_to_opts, load_settings_toml};
use crate::utils::setup_logging;

fn setup_opts(cli: &Cli) -> Opts {
    let mut opts = Opts::default();
    // The merge command consumes its input runs unless told to keep them.
    if matches!(cli.command, Commands::Merge(_)) {
        opts.merge.delete_inputs = true;
    }
    if let Ok(cwd) = std::env::current_dir()
        && let Some(file) = load_settings_toml(&cwd)
    {
        apply_file_to_opts(&file, &mut opts);
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
    setup_logging(opts.verbose);
    opts
}

/// Run the selected subcommand.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    match &cli.command {
        Commands::Merge(args) => handle_merge(args, opts)?,
        Commands::Count(args) => handle_count(args, opts)?,
    };
    Ok(())
}
