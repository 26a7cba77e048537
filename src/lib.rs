//! freqfold: staged concurrent batch pipeline and external merge reducer for
//! building sorted `<key>\t<count>` frequency tables larger than memory.
//!
//! - [`pipeline`]: N stages, N+1 bounded queues with EOS quorum counting, one
//!   worker pool per stage, lazy terminal output.
//! - [`merge`]: bounded fan-in k-way merge of sorted runs and the final
//!   threshold collapse.

pub mod engine;
pub mod merge;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use merge::{MergeError, MergeOutcome, MergeStats, RunAccumulator, merge_and_collapse, reduce};
pub use pipeline::{Pipeline, PipelineRun, Stage, StageSpec};

/// Result alias used by public freqfold API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point for a one-shot job: run `pipeline` over `input`, collect
/// every run path it emits, and reduce them into `output` with `opts`.
///
/// The emitted runs are owned by the reduce only if `opts.delete_inputs` is set.
pub fn pipeline_then_reduce<In, I>(
    pipeline: Pipeline<In, std::path::PathBuf>,
    input: I,
    output: Option<&std::path::Path>,
    opts: &MergeOpts,
) -> Result<MergeOutcome>
where
    In: Send + 'static,
    I: IntoIterator<Item = In>,
    I::IntoIter: Send + 'static,
{
    let runs = pipeline.run(input).collect_all()?;
    log::debug!("pipeline produced {} runs", runs.len());
    reduce(runs, output, opts)
}
