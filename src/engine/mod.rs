//! Engine module: CLI parsing, command handlers and the counting job

pub mod arg_parser;
pub mod cli;
pub mod count;
pub mod handlers;
pub mod progress;

// Re-export commonly used functions
pub use arg_parser::{Cli, Commands, CommonArgs, CountArgs, MergeArgs};
pub use cli::handle_run;
pub use count::{collect_input_files, count_corpus, count_keys, extract_keys};
pub use handlers::{handle_count, handle_merge};
