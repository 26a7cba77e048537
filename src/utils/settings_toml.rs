//! Load `freqfold.toml` from a directory (CLI only). The lib does not use this;
//! library callers pass `MergeOpts` / `PipelineOpts` directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::types::RunFormat;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct SettingsToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    workers: Option<usize>,
    batch_size: Option<usize>,
    queue_capacity: Option<usize>,
    fanout: Option<usize>,
    threshold: Option<u64>,
    keep_inputs: Option<bool>,
    compress: Option<bool>,
    tmp_dir: Option<String>,
    column: Option<usize>,
    verbose: Option<bool>,
}

/// Parse settings from a TOML string. Returns None (with a warning) when invalid.
pub fn parse_settings_toml(s: &str, origin: &Path) -> Option<SettingsToml> {
    toml::from_str(s)
        .map_err(|e| log::warn!("{}: {}", origin.display(), e))
        .ok()
}

/// Load `freqfold.toml` from `dir` if present. Returns None if file missing or unreadable. CLI only.
pub fn load_settings_toml(dir: &Path) -> Option<SettingsToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_settings_toml(&s, &path)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $field:ident => $target:expr) => {
        if let Some(v) = $sec.$field {
            $target = v;
        }
    };
}

/// Apply file config to opts (only set fields present in the file). Call before applying CLI.
pub fn apply_file_to_opts(file: &SettingsToml, opts: &mut Opts) {
    let sec = &file.settings;
    if let Some(w) = sec.workers {
        opts.pipeline.workers = Some(w);
    }
    apply_file_opt!(sec, batch_size => opts.pipeline.batch_size);
    apply_file_opt!(sec, queue_capacity => opts.pipeline.queue_capacity);
    apply_file_opt!(sec, fanout => opts.merge.fanout);
    apply_file_opt!(sec, threshold => opts.merge.threshold);
    if let Some(keep) = sec.keep_inputs {
        opts.merge.delete_inputs = !keep;
    }
    if let Some(compress) = sec.compress {
        opts.merge.format = RunFormat::from_compress(compress);
    }
    if let Some(ref p) = sec.tmp_dir {
        opts.merge.tmp_dir = Some(PathBuf::from(p));
    }
    if let Some(c) = sec.column {
        opts.column = Some(c);
    }
    apply_file_opt!(sec, verbose => opts.verbose);
}
