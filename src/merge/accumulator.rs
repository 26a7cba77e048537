//! Incremental reducer fed while a pipeline is still producing runs.

use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::types::MergeOpts;

use super::error::MergeError;
use super::kway::{PendingRun, merge_group, merge_rounds, release_runs};
use super::reducer::{
    MergeOutcome, MergeStats, default_output, effective_fanout, finish_collapse, merge_temp_dir,
};

/// Hierarchical merger: runs are added one at a time and merged in groups of
/// `fanout` as soon as enough are pending, so the pending set stays bounded
/// however many runs the pipeline emits. [`Self::finish`] reduces the rest.
///
/// Added runs follow [`MergeOpts::delete_inputs`]; runs produced here are always owned.
pub struct RunAccumulator {
    opts: MergeOpts,
    fanout: usize,
    pending: Vec<PendingRun>,
    tmp: TempDir,
    stats: MergeStats,
    added: usize,
}

impl RunAccumulator {
    /// `work_dir` hosts the private temp directory when `opts.tmp_dir` is unset.
    pub fn new(opts: MergeOpts, work_dir: &Path) -> Result<Self> {
        let fanout = effective_fanout(opts.fanout)?;
        let tmp = merge_temp_dir(&opts, work_dir)?;
        Ok(Self {
            opts,
            fanout,
            pending: Vec::with_capacity(fanout),
            tmp,
            stats: MergeStats::default(),
            added: 0,
        })
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn added(&self) -> usize {
        self.added
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    /// Add one sorted run; merges the pending group once it reaches `fanout`.
    pub fn add(&mut self, path: PathBuf) -> Result<()> {
        self.added += 1;
        self.pending.push(PendingRun {
            path,
            owned: self.opts.delete_inputs,
        });
        if self.pending.len() >= self.fanout {
            self.compact()?;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        let group = std::mem::take(&mut self.pending);
        let inputs: Vec<PathBuf> = group.iter().map(|r| r.path.clone()).collect();
        let output = self.tmp.path().join(format!(
            "acc-{}.{}",
            uuid::Uuid::new_v4(),
            self.opts.format.extension()
        ));
        let merged = merge_group(&inputs, &output, self.opts.format)?;
        self.stats.rounds += 1;
        self.stats.runs_merged += inputs.len();
        self.stats.intermediate_runs += 1;
        self.stats.peak_open_runs = self.stats.peak_open_runs.max(merged.open_readers);
        debug!(
            "accumulator: merged {} pending runs ({} records)",
            inputs.len(),
            merged.records
        );
        release_runs(&group)?;
        self.pending.push(PendingRun::owned(output));
        Ok(())
    }

    /// Merge what is pending and collapse it into `output` (a fresh path when None).
    pub fn finish(self, output: Option<&Path>) -> Result<MergeOutcome> {
        let RunAccumulator {
            opts,
            fanout,
            pending,
            tmp,
            mut stats,
            added,
        } = self;
        if added == 0 {
            return Err(MergeError::NoInputs.into());
        }
        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output(&opts));
        let merged = merge_rounds(pending, fanout, opts.format, tmp.path(), &mut stats)?;
        finish_collapse(merged, &output, &opts, &mut stats)?;
        tmp.close()?;
        debug!(
            "accumulator: {} runs added, {} merge rounds -> {}",
            added,
            stats.rounds,
            output.display()
        );
        Ok(MergeOutcome {
            path: output,
            stats,
        })
    }
}
