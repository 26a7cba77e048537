pub mod config;
pub mod fd_limit;
pub mod logger;
pub mod settings_toml;
pub mod tempfiles;

pub use config::*;
pub use fd_limit::{max_fanout_by_fd_limit, max_open_fds};
pub use logger::{Colors, setup_logging};
pub use tempfiles::{job_temp_dir, rename_temp_to_final, temp_path_for};
