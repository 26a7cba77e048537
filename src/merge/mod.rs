//! External sorted-merge reducer: run file I/O, k-way merge rounds, collapse.

pub mod accumulator;
pub mod collapse;
pub mod error;
pub mod kway;
pub mod record;
pub mod reducer;
pub mod run_io;

pub use accumulator::RunAccumulator;
pub use collapse::{CollapseStats, collapse};
pub use error::MergeError;
pub use kway::{GroupMerge, PendingRun, merge_group, merge_rounds};
pub use record::{RunningSum, format_record, parse_record};
pub use reducer::{
    MergeOutcome, MergeStats, effective_fanout, expand_pattern, merge_and_collapse, merge_pattern,
    reduce,
};
pub use run_io::{RunReader, RunWriter, read_run, write_sorted_run};
