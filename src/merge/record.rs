//! Run records (`<key>\t<count>`) and the running per-key sum shared by
//! merge rounds and the final collapse.

use std::path::Path;

use super::error::MergeError;
use crate::types::Count;

/// Split a run line into key and count. The count follows the last tab.
pub fn parse_record<'a>(
    line: &'a str,
    path: &Path,
    line_no: usize,
) -> Result<(&'a str, Count), MergeError> {
    let malformed = || MergeError::MalformedLine {
        path: path.to_path_buf(),
        line: line_no,
        content: line.to_string(),
    };
    let (key, count) = line.rsplit_once('\t').ok_or_else(malformed)?;
    let count = count.trim().parse::<Count>().map_err(|_| malformed())?;
    Ok((key, count))
}

pub fn format_record(key: &str, count: Count) -> String {
    format!("{key}\t{count}")
}

/// Streaming `(current_key, running_sum)`. Feed keys in sorted order; a
/// completed pair is handed back whenever the key changes.
#[derive(Debug, Default)]
pub struct RunningSum {
    current: Option<(String, Count)>,
}

impl RunningSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one record. Returns the previous key's total when `key` starts a new group.
    /// `path` only labels the error if `key` sorts before the current key.
    pub fn push(
        &mut self,
        key: &str,
        count: Count,
        path: &Path,
    ) -> Result<Option<(String, Count)>, MergeError> {
        if let Some((cur, sum)) = self.current.as_mut() {
            if cur.as_str() == key {
                *sum = sum
                    .checked_add(count)
                    .ok_or_else(|| MergeError::CountOverflow {
                        key: key.to_string(),
                    })?;
                return Ok(None);
            }
            if key < cur.as_str() {
                return Err(MergeError::Unsorted {
                    path: path.to_path_buf(),
                    key: key.to_string(),
                    previous: cur.clone(),
                });
            }
        }
        Ok(self.current.replace((key.to_string(), count)))
    }

    /// The final pending pair, after input is exhausted.
    pub fn finish(&mut self) -> Option<(String, Count)> {
        self.current.take()
    }
}
