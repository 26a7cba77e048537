//! Application configuration constants.
//! Tuning and defaults in one place.

use std::sync::OnceLock;

// ---- Package / names (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    merge_tmp_prefix: String,
    job_tmp_prefix: String,
    merged_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!("{pkg}.toml"),
                merge_tmp_prefix: format!(".{pkg}-merge-"),
                job_tmp_prefix: format!(".{pkg}-job-"),
                merged_prefix: format!("{pkg}-merged"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Optional settings file looked up in the working directory (CLI only).
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Prefix of the private temp directory owned by one merge invocation.
    pub fn merge_tmp_prefix(&self) -> &str {
        &self.merge_tmp_prefix
    }

    /// Prefix of the temp directory a `count` job writes its partial runs to.
    pub fn job_tmp_prefix(&self) -> &str {
        &self.job_tmp_prefix
    }

    /// Stem of reducer outputs when the caller gives no output path.
    pub fn merged_prefix(&self) -> &str {
        &self.merged_prefix
    }
}

// ---- Pipeline ----

/// Capacity of each stage queue, in batches.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Items per batch handed to the counting stage.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Paths per batch handed to the reading stage (one file per invocation).
pub const READ_BATCH_SIZE: usize = 1;

// ---- Merge ----

/// Runs merged together per k-way pass unless capped by the FD limit.
pub const DEFAULT_FANOUT: usize = 1024;

/// Descriptors kept free for the process besides the runs being merged
/// (stdio, the output writer, the logger, pipeline files).
pub const FDS_RESERVED: usize = 32;

// ---- Progress ----

/// Progress bar and update batching.
pub struct ProgressConsts;

impl ProgressConsts {
    /// Label of the run-file counter shown in verbose mode.
    pub const RUNS_DESC: &'static str = "Counting";
    /// Unit shown next to the counter.
    pub const RUNS_UNIT: &'static str = " runs";
}
