//! Command handlers for merge and count operations

use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;

use crate::Opts;
use crate::engine::arg_parser::{CommonArgs, CountArgs, MergeArgs};
use crate::engine::count::{collect_input_files, count_corpus, is_glob};
use crate::merge::{MergeOutcome, expand_pattern, reduce};
use crate::types::RunFormat;
use crate::utils::Colors;

/// Apply reducer flags on top of defaults and file config.
fn apply_common_args(common: &CommonArgs, opts: &mut Opts) {
    if let Some(f) = common.fanout {
        opts.merge.fanout = f as usize;
    }
    if let Some(t) = common.threshold {
        opts.merge.threshold = t;
    }
    if let Some(keep) = common.keep_inputs {
        opts.merge.delete_inputs = !keep;
    }
    if let Some(compress) = common.compress {
        opts.merge.format = RunFormat::from_compress(compress);
    }
    if let Some(ref dir) = common.tmp_dir {
        opts.merge.tmp_dir = Some(dir.clone());
    }
}

/// Resolve merge inputs: glob patterns are expanded, plain paths kept as given.
fn resolve_run_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if is_glob(input) {
            let matched = expand_pattern(input)?;
            if matched.is_empty() {
                warn!("pattern {:?} matched no files", input);
            }
            files.extend(matched);
        } else {
            files.push(PathBuf::from(input));
        }
    }
    Ok(files)
}

/// Print the end-of-run summary line.
fn print_outcome(outcome: &MergeOutcome) {
    let stats = &outcome.stats;
    info!(
        "{} | {} | {} -> {}",
        Colors::colorize(Colors::KEPT, &format!("Kept: {}", stats.keys_written)),
        Colors::colorize(Colors::DROPPED, &format!("Dropped: {}", stats.keys_dropped)),
        Colors::colorize(Colors::ROUNDS, &format!("Rounds: {}", stats.rounds)),
        outcome.path.display()
    );
}

/// Handle merge command. Consumed runs are deleted unless `--keep-inputs`.
pub fn handle_merge(args: &MergeArgs, mut opts: Opts) -> Result<MergeOutcome> {
    apply_common_args(&args.common, &mut opts);
    let files = resolve_run_inputs(&args.inputs)?;
    let outcome = reduce(files, args.common.output.as_deref(), &opts.merge)?;
    print_outcome(&outcome);
    Ok(outcome)
}

/// Handle count command.
pub fn handle_count(args: &CountArgs, mut opts: Opts) -> Result<MergeOutcome> {
    apply_common_args(&args.common, &mut opts);
    if let Some(w) = args.workers {
        opts.pipeline.workers = Some(w as usize);
    }
    if let Some(b) = args.batch_size {
        opts.pipeline.batch_size = b as usize;
    }
    if let Some(q) = args.queue_capacity {
        opts.pipeline.queue_capacity = q as usize;
    }
    if let Some(c) = args.column {
        opts.column = Some(c as usize);
    }
    let files = collect_input_files(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("no input files found");
    }
    let outcome = count_corpus(files, args.common.output.as_deref(), &opts)?;
    print_outcome(&outcome);
    Ok(outcome)
}
