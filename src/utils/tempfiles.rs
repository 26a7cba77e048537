use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;

/// Sibling path an output is written to before being renamed into place.
pub fn temp_path_for(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_else(|| PackagePaths::get().merged_prefix());
    output
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.tmp"))
}

pub fn rename_temp_to_final(temp_path: &Path, final_path: &Path) -> Result<()> {
    fs::rename(temp_path, final_path).with_context(|| {
        format!(
            "atomic rename temp output to final path ({} -> {})",
            temp_path.display(),
            final_path.display()
        )
    })
}

/// Temp directory for one `count` job's partial runs, created under `parent`.
pub fn job_temp_dir(parent: &Path) -> Result<tempfile::TempDir> {
    fs::create_dir_all(parent)
        .with_context(|| format!("create work directory {}", parent.display()))?;
    tempfile::Builder::new()
        .prefix(PackagePaths::get().job_tmp_prefix())
        .tempdir_in(parent)
        .with_context(|| format!("create job temp dir in {}", parent.display()))
}
