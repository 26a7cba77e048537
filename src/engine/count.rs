//! Counting job: the two stages fed to the pipeline by the `count` command,
//! and the driver that folds their partial runs with a [`RunAccumulator`].
//!
//! Stage 0 reads files into lines; stage 1 counts keys in a batch of lines and
//! writes one sorted, uniquely named run per batch, emitting its path.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Opts;
use crate::engine::progress::{create_counter, update_progress_bar};
use crate::merge::{MergeOutcome, RunAccumulator, expand_pattern, write_sorted_run};
use crate::pipeline::{Pipeline, StageSpec};
use crate::types::{Count, RunFormat};
use crate::utils::config::{PackagePaths, ProgressConsts, READ_BATCH_SIZE};
use crate::utils::tempfiles::job_temp_dir;

/// True when `s` holds glob metacharacters.
pub(crate) fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expand CLI inputs: files as-is, directories walked recursively, globs expanded.
/// Missing paths are skipped with a warning.
pub fn collect_input_files(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if is_glob(input) {
            files.extend(expand_pattern(input)?);
            continue;
        }
        let path = PathBuf::from(input);
        if path.is_dir() {
            for entry in WalkDir::new(&path).sort_by_file_name() {
                match entry {
                    Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
                    Ok(_) => {}
                    Err(err) => warn!("skipping unreadable entry under {}: {}", input, err),
                }
            }
        } else if path.is_file() {
            files.push(path);
        } else {
            warn!("skipping missing input {}", input);
        }
    }
    Ok(files)
}

/// Open a corpus file for line reading; `.gz` is decompressed.
fn open_text(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(match RunFormat::for_path(path) {
        RunFormat::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        RunFormat::Text => Box::new(BufReader::new(file)),
    })
}

/// Read every line of one file. Read errors end the file early with a warning.
pub fn read_file_lines(path: &Path) -> Vec<String> {
    let reader = match open_text(path) {
        Ok(r) => r,
        Err(e) => {
            warn!("skipping {:#}", e);
            return Vec::new();
        }
    };
    let mut lines = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        match line {
            Ok(l) => lines.push(l),
            Err(e) => {
                warn!("{}:{}: {}; skipping rest of file", path.display(), n + 1, e);
                break;
            }
        }
    }
    lines
}

/// Stage 0: a batch of paths becomes the lines they contain.
pub fn read_lines_stage() -> impl Fn(Vec<PathBuf>) -> Vec<String> + Send + Sync + 'static {
    |paths: Vec<PathBuf>| paths.iter().flat_map(|p| read_file_lines(p)).collect()
}

/// Keys found on one line: whitespace tokens, or the value of a 1-based tab column.
pub fn extract_keys(line: &str, column: Option<usize>) -> Vec<&str> {
    match column {
        None => line.split_whitespace().collect(),
        Some(c) => line
            .split('\t')
            .nth(c.saturating_sub(1))
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .into_iter()
            .collect(),
    }
}

/// Count keys across a batch of lines, sorted by key.
pub fn count_keys(lines: &[String], column: Option<usize>) -> BTreeMap<&str, Count> {
    let mut counts = BTreeMap::new();
    for line in lines {
        for key in extract_keys(line, column) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

/// Write one batch's counts as a run named with a fresh UUID, so workers never
/// share a file. Returns None when the batch held no keys.
pub fn write_count_run(
    counts: &BTreeMap<&str, Count>,
    dir: &Path,
    format: RunFormat,
) -> Result<Option<PathBuf>> {
    if counts.is_empty() {
        return Ok(None);
    }
    let path = dir.join(format!("counts-{}.{}", uuid::Uuid::new_v4(), format.extension()));
    write_sorted_run(&path, format, counts.iter().map(|(k, c)| (*k, *c)))?;
    Ok(Some(path))
}

/// Stage 1: a batch of lines becomes (at most) one sorted run file.
pub fn count_keys_stage(
    run_dir: PathBuf,
    column: Option<usize>,
    format: RunFormat,
) -> impl Fn(Vec<String>) -> Option<Result<PathBuf>> + Send + Sync + 'static {
    move |lines: Vec<String>| {
        let counts = count_keys(&lines, column);
        write_count_run(&counts, &run_dir, format).transpose()
    }
}

/// Run the counting pipeline over `files` and reduce its runs into `output`.
pub fn count_corpus(files: Vec<PathBuf>, output: Option<&Path>, opts: &Opts) -> Result<MergeOutcome> {
    let work_parent = opts
        .merge
        .tmp_dir
        .clone()
        .or_else(|| output.and_then(Path::parent).map(Path::to_path_buf))
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    let job_dir = job_temp_dir(&work_parent)?;
    let workers = opts.pipeline.effective_workers();
    info!(
        "{}: counting {} files with {} workers per stage",
        PackagePaths::get().pkg_name(),
        files.len(),
        workers
    );

    let pipeline = Pipeline::<PathBuf, PathBuf>::new()
        .with_queue_capacity(opts.pipeline.queue_capacity)
        .stage::<String, _>(read_lines_stage(), StageSpec::new(workers, READ_BATCH_SIZE))
        .stage::<Result<PathBuf>, _>(
            count_keys_stage(job_dir.path().to_path_buf(), opts.column, opts.merge.format),
            StageSpec::new(workers, opts.pipeline.batch_size),
        );

    // Partial runs live in the job dir and are always ours to delete.
    let mut merge_opts = opts.merge.clone();
    merge_opts.delete_inputs = true;
    let mut acc = RunAccumulator::new(merge_opts, job_dir.path())?;

    let bar = opts
        .verbose
        .then(|| create_counter(ProgressConsts::RUNS_DESC, ProgressConsts::RUNS_UNIT));
    let mut run = pipeline.run(files);
    for produced in run.by_ref() {
        acc.add(produced?)?;
        if let Some(bar) = &bar {
            update_progress_bar(bar, 1);
        }
    }
    let summary = run.finish()?;
    if bar.is_some() {
        eprintln!();
    }
    debug!(
        "count: {} files in, {} runs out",
        summary.items_in, summary.items_out
    );

    let outcome = acc.finish(output)?;
    job_dir.close().context("remove job temp dir")?;
    Ok(outcome)
}
