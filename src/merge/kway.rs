//! Bounded fan-in k-way merge of sorted runs.
//!
//! One group is merged with a min-heap keyed on the parsed key and the run
//! index (so equal keys keep input order). The heap uses the same byte order
//! as the running sum, so keys holding tabs or bytes below `\t` merge like any
//! other. Adjacent equal keys are summed on the way out; no threshold is
//! applied here. Rounds repeat on the produced runs until one remains, so at
//! most `fanout` input runs (plus the one output) are ever open at the same time.

use anyhow::{Context, Result};
use log::debug;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

use crate::types::{Count, RunFormat};

use super::error::MergeError;
use super::record::{RunningSum, parse_record};
use super::run_io::{RunReader, RunWriter};
use super::reducer::MergeStats;

/// A run waiting to be merged. `owned` runs are deleted once superseded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRun {
    pub path: PathBuf,
    pub owned: bool,
}

impl PendingRun {
    pub fn owned(path: PathBuf) -> Self {
        Self { path, owned: true }
    }

    pub fn borrowed(path: PathBuf) -> Self {
        Self { path, owned: false }
    }
}

/// Remove superseded runs that belong to the merge.
pub fn release_runs(runs: &[PendingRun]) -> Result<()> {
    for run in runs.iter().filter(|r| r.owned) {
        std::fs::remove_file(&run.path)
            .with_context(|| format!("remove merged run {}", run.path.display()))?;
    }
    Ok(())
}

/// What one group merge wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupMerge {
    pub records: u64,
    /// Run readers open on this thread once every input of the group was opened.
    pub open_readers: usize,
}

type HeapEntry = Reverse<(String, usize, Count)>;

/// Next record of run `idx`, as a heap entry.
fn next_entry(reader: &mut RunReader, idx: usize) -> Result<Option<HeapEntry>> {
    let Some(line) = reader.next_line()? else {
        return Ok(None);
    };
    let (key, count) = parse_record(&line, reader.path(), reader.line_no())?;
    Ok(Some(Reverse((key.to_string(), idx, count))))
}

/// Merge one group of sorted runs into `output`, summing adjacent equal keys.
pub fn merge_group(inputs: &[PathBuf], output: &Path, format: RunFormat) -> Result<GroupMerge> {
    let mut readers = inputs
        .iter()
        .map(|p| RunReader::open(p))
        .collect::<Result<Vec<_>>>()?;
    let open_readers = RunReader::open_on_thread();

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(readers.len());
    for (idx, reader) in readers.iter_mut().enumerate() {
        if let Some(entry) = next_entry(reader, idx)? {
            heap.push(entry);
        }
    }

    let mut writer = RunWriter::create(output, format)?;
    let mut sum = RunningSum::new();
    while let Some(Reverse((key, idx, count))) = heap.pop() {
        let reader = &mut readers[idx];
        // A run that goes backwards pops a key below the previous one here.
        if let Some((done_key, total)) = sum.push(&key, count, reader.path())? {
            writer.write_record(&done_key, total)?;
        }
        if let Some(entry) = next_entry(reader, idx)? {
            heap.push(entry);
        }
    }
    if let Some((key, total)) = sum.finish() {
        writer.write_record(&key, total)?;
    }
    Ok(GroupMerge {
        records: writer.finish()?,
        open_readers,
    })
}

/// Reduce `runs` to a single run by merging groups of at most `fanout` runs per
/// round. Groups of one pass through untouched. Produced runs are written to
/// `tmp_dir` and owned by the merge.
pub fn merge_rounds(
    mut runs: Vec<PendingRun>,
    fanout: usize,
    format: RunFormat,
    tmp_dir: &Path,
    stats: &mut MergeStats,
) -> Result<PendingRun> {
    if fanout < 2 {
        return Err(MergeError::InvalidFanout(fanout).into());
    }
    if runs.is_empty() {
        return Err(MergeError::NoInputs.into());
    }

    while runs.len() > 1 {
        stats.rounds += 1;
        let round = stats.rounds;
        let mut next = Vec::with_capacity(runs.len().div_ceil(fanout));
        for group in runs.chunks(fanout) {
            if let [single] = group {
                next.push(single.clone());
                continue;
            }
            let output = tmp_dir.join(format!(
                "round{}-{}.{}",
                round,
                uuid::Uuid::new_v4(),
                format.extension()
            ));
            let inputs: Vec<PathBuf> = group.iter().map(|r| r.path.clone()).collect();
            let merged = merge_group(&inputs, &output, format)?;
            stats.peak_open_runs = stats.peak_open_runs.max(merged.open_readers);
            stats.runs_merged += inputs.len();
            stats.intermediate_runs += 1;
            debug!(
                "merge round {}: {} runs -> {} ({} records)",
                round,
                inputs.len(),
                output.display(),
                merged.records
            );
            release_runs(group)?;
            next.push(PendingRun::owned(output));
        }
        runs = next;
    }

    runs.pop().ok_or_else(|| MergeError::NoInputs.into())
}
