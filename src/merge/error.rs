use std::path::PathBuf;

/// Reducer failures. Each aborts the merge call; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("nothing to merge: empty input file set")]
    NoInputs,

    #[error("merge fan-out must be at least 2 (got {0})")]
    InvalidFanout(usize),

    #[error("{}:{line}: malformed run record {content:?} (expected <key>\\t<count>)", path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("{}: key {key:?} sorts before previous key {previous:?}; input runs must be sorted", path.display())]
    Unsorted {
        path: PathBuf,
        key: String,
        previous: String,
    },

    #[error("count overflow while summing key {key:?}")]
    CountOverflow { key: String },
}
