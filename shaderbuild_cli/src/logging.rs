//! Logger setup

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Picks the level from `-v`/`-q`, or `None` to leave `RUST_LOG` in charge.
pub fn level_for(verbose: u8, quiet: bool) -> Option<LevelFilter> {
    match (quiet, verbose) {
        (true, _) => Some(LevelFilter::Warn),
        (false, 0) => None,
        (false, 1) => Some(LevelFilter::Debug),
        (false, _) => Some(LevelFilter::Trace),
    }
}

/// Initializes `env_logger`.
///
/// Defaults to `info`, honours `RUST_LOG`, and lets `-v`/`-q` override both.
pub fn init_logger(verbose: u8, quiet: bool) {
    let env = Env::default().filter_or("RUST_LOG", "info");
    let mut builder = Builder::from_env(env);
    builder.format_timestamp(None).format_target(false);

    if let Some(level) = level_for(verbose, quiet) {
        builder.filter_level(level);
    }

    builder.init();
}
