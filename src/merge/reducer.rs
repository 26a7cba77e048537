//! External sorted-merge reducer: many sorted runs in, one aggregated,
//! threshold-filtered run out.
//!
//! **Ownership:** the reducer deletes every intermediate run it creates as soon
//! as the run is superseded, and removes its private temp directory on return.
//! The caller's input runs are deleted only when [`MergeOpts::delete_inputs`]
//! is set, and then as soon as they have been merged.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::types::MergeOpts;
use crate::utils::config::PackagePaths;
use crate::utils::fd_limit::max_fanout_by_fd_limit;

use super::collapse::collapse;
use super::error::MergeError;
use super::kway::{PendingRun, merge_rounds, release_runs};

/// Counters for one reduce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// k-way merge rounds performed (0 when a single run only needed collapsing).
    pub rounds: usize,
    /// Runs consumed by k-way merges (inputs and intermediates).
    pub runs_merged: usize,
    /// Runs written by k-way merges.
    pub intermediate_runs: usize,
    /// Most run files open for reading at once.
    pub peak_open_runs: usize,
    pub keys_written: u64,
    pub keys_dropped: u64,
}

/// Result of a reduce: the output path and what it took to get there.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub path: PathBuf,
    pub stats: MergeStats,
}

/// Fan-out actually used: the requested one, capped by the open-file limit.
pub fn effective_fanout(requested: usize) -> Result<usize> {
    if requested < 2 {
        return Err(MergeError::InvalidFanout(requested).into());
    }
    match max_fanout_by_fd_limit() {
        Some(cap) if cap < requested => {
            warn!(
                "merge fan-out {} exceeds the open file limit; using {}",
                requested, cap
            );
            Ok(cap.max(2))
        }
        _ => Ok(requested),
    }
}

/// Private temp directory for one merge invocation, under `opts.tmp_dir` or `fallback`.
pub(crate) fn merge_temp_dir(opts: &MergeOpts, fallback: &Path) -> Result<TempDir> {
    let parent = opts.tmp_dir.as_deref().unwrap_or(fallback);
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create merge temp parent {}", parent.display()))?;
    tempfile::Builder::new()
        .prefix(PackagePaths::get().merge_tmp_prefix())
        .tempdir_in(parent)
        .with_context(|| format!("create merge temp dir in {}", parent.display()))
}

/// Default output location when the caller gives none.
pub(crate) fn default_output(opts: &MergeOpts) -> PathBuf {
    let dir = opts.tmp_dir.clone().unwrap_or_else(std::env::temp_dir);
    dir.join(format!(
        "{}-{}.{}",
        PackagePaths::get().merged_prefix(),
        uuid::Uuid::new_v4(),
        opts.format.extension()
    ))
}

fn output_parent(output: &Path) -> PathBuf {
    match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Merge `files` and collapse them into one sorted run. Returns the output path.
pub fn merge_and_collapse(
    files: Vec<PathBuf>,
    output: Option<&Path>,
    opts: &MergeOpts,
) -> Result<PathBuf> {
    Ok(reduce(files, output, opts)?.path)
}

/// Expand a glob pattern and reduce the matching runs.
pub fn merge_pattern(pattern: &str, output: Option<&Path>, opts: &MergeOpts) -> Result<MergeOutcome> {
    let files = expand_pattern(pattern)?;
    reduce(files, output, opts)
}

/// Files matching `pattern`, sorted by path.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = glob::glob(pattern)
        .with_context(|| format!("invalid glob pattern {pattern:?}"))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("expand glob pattern {pattern:?}"))?;
    files.retain(|p| p.is_file());
    files.sort();
    Ok(files)
}

/// Full reduce with statistics: k-way merge rounds, then the final collapse.
pub fn reduce(files: Vec<PathBuf>, output: Option<&Path>, opts: &MergeOpts) -> Result<MergeOutcome> {
    if files.is_empty() {
        return Err(MergeError::NoInputs.into());
    }
    let fanout = effective_fanout(opts.fanout)?;
    let input_count = files.len();
    let output = output.map(Path::to_path_buf).unwrap_or_else(|| default_output(opts));
    let tmp = merge_temp_dir(opts, &output_parent(&output))?;
    debug!(
        "reduce: {} runs, fan-out {}, threshold {}, temp {}",
        input_count,
        fanout,
        opts.threshold,
        tmp.path().display()
    );

    let runs = files
        .into_iter()
        .map(|path| PendingRun {
            path,
            owned: opts.delete_inputs,
        })
        .collect();
    let mut stats = MergeStats::default();
    let merged = merge_rounds(runs, fanout, opts.format, tmp.path(), &mut stats)?;
    let finished = finish_collapse(merged, &output, opts, &mut stats);
    let closed = tmp.close().context("remove merge temp dir");
    finished?;
    closed?;

    info!(
        "reduced {} runs in {} rounds: {} keys kept, {} dropped (threshold {}) -> {}",
        input_count,
        stats.rounds,
        stats.keys_written,
        stats.keys_dropped,
        opts.threshold,
        output.display()
    );
    Ok(MergeOutcome {
        path: output,
        stats,
    })
}

/// Collapse the single remaining run into `output` and release it.
pub(crate) fn finish_collapse(
    merged: PendingRun,
    output: &Path,
    opts: &MergeOpts,
    stats: &mut MergeStats,
) -> Result<()> {
    stats.peak_open_runs = stats.peak_open_runs.max(1);
    let collapsed = collapse(&merged.path, output, opts.threshold)?;
    stats.keys_written = collapsed.keys_written;
    stats.keys_dropped = collapsed.keys_dropped;
    if merged.path != output {
        release_runs(std::slice::from_ref(&merged))?;
    }
    Ok(())
}
