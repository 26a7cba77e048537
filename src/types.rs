//! Public types shared by the pipeline, the reducer and the CLI.

use std::path::{Path, PathBuf};

use crate::utils::config::{DEFAULT_BATCH_SIZE, DEFAULT_FANOUT, DEFAULT_QUEUE_CAPACITY};

/// Frequency count. Sums are checked; overflow aborts the merge.
pub type Count = u64;

/// On-disk encoding of a run file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunFormat {
    #[default]
    Text,
    Gzip,
}

impl RunFormat {
    /// `.gz` files are gzip; anything else is plain text.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => RunFormat::Gzip,
            _ => RunFormat::Text,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RunFormat::Text => "txt",
            RunFormat::Gzip => "txt.gz",
        }
    }

    pub fn from_compress(compress: bool) -> Self {
        if compress {
            RunFormat::Gzip
        } else {
            RunFormat::Text
        }
    }
}

/// Reducer options.
#[derive(Clone, Debug)]
pub struct MergeOpts {
    /// Max runs merged together in one k-way pass (and max run files open at once).
    pub fanout: usize,
    /// Keys whose total is not strictly greater than this are dropped.
    pub threshold: Count,
    /// Delete the caller's input runs once they have been merged.
    pub delete_inputs: bool,
    /// Encoding of intermediate runs and of default output paths.
    pub format: RunFormat,
    /// Parent directory for the merge's private temp directory. When None, the
    /// output's directory is used (so the final rename stays on one filesystem).
    pub tmp_dir: Option<PathBuf>,
}

impl Default for MergeOpts {
    fn default() -> Self {
        Self {
            fanout: DEFAULT_FANOUT,
            threshold: 0,
            delete_inputs: false,
            format: RunFormat::Text,
            tmp_dir: None,
        }
    }
}

/// Worker pool settings applied to every stage of a CLI-built pipeline.
#[derive(Clone, Debug)]
pub struct PipelineOpts {
    /// Workers per stage. When None, `rayon::current_num_threads()`.
    pub workers: Option<usize>,
    /// Input batch size of the counting stage.
    pub batch_size: usize,
    /// Capacity (in batches) of every stage queue.
    pub queue_capacity: usize,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            workers: None,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl PipelineOpts {
    pub fn effective_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(rayon::current_num_threads)
            .max(1)
    }
}

/// Full options (CLI). Built from defaults, then `freqfold.toml`, then flags.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    pub merge: MergeOpts,
    pub pipeline: PipelineOpts,
    /// 1-based tab column holding the key (count command). None: whitespace tokens.
    pub column: Option<usize>,
    /// Show a progress counter and debug logging.
    pub verbose: bool,
}
