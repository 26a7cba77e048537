use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Build frequency tables too large to sort in memory: count keys with a
/// staged worker pipeline, then fold sorted runs with an external merge.
#[derive(Clone, Parser)]
#[command(name = "freqfold")]
#[command(about = "Count keys into sorted runs and merge runs into one thresholded frequency table.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (debug logging and a progress counter).
    #[arg(long, short = 'v', global = true, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Merge sorted `<key>\t<count>` runs into one aggregated, thresholded file.
    Merge(MergeArgs),
    /// Count keys in text files with the worker pipeline, then merge the partial runs.
    Count(CountArgs),
}

/// Reducer flags shared by both commands.
#[derive(Clone, Args)]
pub struct CommonArgs {
    /// Output file. `.gz` output is gzip-compressed. Default: a fresh file in the temp directory.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Max runs merged together in one pass (and max run files open at once).
    #[arg(long, short = 'F', value_parser = clap::value_parser!(u64).range(2..))]
    pub fanout: Option<u64>,

    /// Drop keys whose total count is not strictly greater than this.
    #[arg(long, short = 't')]
    pub threshold: Option<u64>,

    /// Keep input runs instead of deleting them once merged.
    #[arg(long, short = 'k', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub keep_inputs: Option<bool>,

    /// Gzip intermediate runs.
    #[arg(long, short = 'z', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub compress: Option<bool>,

    /// Parent directory for temporary runs. Default: the output's directory.
    #[arg(long)]
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Clone, Args)]
pub struct MergeArgs {
    /// Run files or glob patterns (quote patterns to stop the shell expanding them).
    #[arg(value_name = "RUNS", required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Clone, Args)]
pub struct CountArgs {
    /// Text files, directories, or glob patterns. `.gz` files are decompressed.
    #[arg(value_name = "INPUTS", required = true, num_args = 1..)]
    pub inputs: Vec<String>,

    /// Workers per pipeline stage. Default: available threads.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(u64).range(1..))]
    pub workers: Option<u64>,

    /// Lines per counting batch (one partial run file per batch).
    #[arg(long, short = 'b', value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Capacity of each stage queue, in batches.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_capacity: Option<u64>,

    /// Count the values of this 1-based tab-separated column instead of whitespace tokens.
    #[arg(long, short = 'c', value_parser = clap::value_parser!(u64).range(1..))]
    pub column: Option<u64>,

    #[command(flatten)]
    pub common: CommonArgs,
}
