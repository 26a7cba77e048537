use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Module path without the crate prefix (`freqfold::merge::kway` -> `merge::kway`).
fn short_target(target: &str) -> &str {
    let pkg = env!("CARGO_PKG_NAME");
    target
        .strip_prefix(pkg)
        .and_then(|t| t.strip_prefix("::"))
        .unwrap_or(target)
}

/// Initialise env_logger for the CLI. Dependencies log at Warn; this crate at
/// Info, or Debug (tagged with the emitting module) when `verbose`.
/// A second call is a no-op.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME").cyan();
            let target = short_target(record.target());
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = if record.level() == Level::Error {
                        "ERROR".red()
                    } else {
                        "WARN".yellow()
                    };
                    format!("[{} {} {}] {}", name, level_str, target.white(), record.args())
                }
                Level::Info => format!("[{}] {}", name, record.args()),
                Level::Debug | Level::Trace => {
                    format!("[{} {}] {}", name, target.dimmed(), record.args())
                }
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}

/// Colours for the end-of-run summary line.
pub struct Colors;

impl Colors {
    pub const KEPT: &'static str = "green";
    pub const DROPPED: &'static str = "yellow";
    pub const ROUNDS: &'static str = "cyan";

    pub fn colorize(color: &str, text: &str) -> String {
        text.color(color).to_string()
    }
}
