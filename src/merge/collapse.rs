//! Final streaming collapse: sum adjacent equal keys, keep totals strictly above the threshold.

use anyhow::Result;
use std::path::Path;

use crate::types::{Count, RunFormat};
use crate::utils::tempfiles::{rename_temp_to_final, temp_path_for};

use super::record::{RunningSum, parse_record};
use super::run_io::{RunReader, RunWriter};

/// Totals from one collapse pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollapseStats {
    pub records_read: u64,
    pub keys_written: u64,
    pub keys_dropped: u64,
}

/// Collapse the sorted run `input` into `output`. The output is written next
/// to its final path and renamed into place once complete; its format follows
/// its extension. `input` may equal `output`.
pub fn collapse(input: &Path, output: &Path, threshold: Count) -> Result<CollapseStats> {
    let tmp = temp_path_for(output);
    let stats = collapse_into(input, &tmp, RunFormat::for_path(output), threshold)
        .inspect_err(|_| {
            let _ = std::fs::remove_file(&tmp);
        })?;
    rename_temp_to_final(&tmp, output)?;
    Ok(stats)
}

fn collapse_into(
    input: &Path,
    output: &Path,
    format: RunFormat,
    threshold: Count,
) -> Result<CollapseStats> {
    let mut reader = RunReader::open(input)?;
    let mut writer = RunWriter::create(output, format)?;
    let mut stats = CollapseStats::default();
    let mut sum = RunningSum::new();

    let mut emit = |key: &str, total: Count, stats: &mut CollapseStats| -> Result<()> {
        if total > threshold {
            writer.write_record(key, total)?;
            stats.keys_written += 1;
        } else {
            stats.keys_dropped += 1;
        }
        Ok(())
    };

    while let Some(line) = reader.next_line()? {
        stats.records_read += 1;
        let (key, count) = parse_record(&line, input, reader.line_no())?;
        if let Some((done_key, total)) = sum.push(key, count, input)? {
            emit(&done_key, total, &mut stats)?;
        }
    }
    if let Some((key, total)) = sum.finish() {
        emit(&key, total, &mut stats)?;
    }
    drop(emit);
    writer.finish()?;
    Ok(stats)
}
