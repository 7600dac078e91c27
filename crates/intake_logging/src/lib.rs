#![deny(missing_docs)]
//! Shared logging utilities for the receipt intake workspace.
//!
//! Every crate logs through the `intake_*` macros so that all records carry the
//! same target and can be filtered as one stream, whatever sink the binary
//! installs.

use std::sync::Once;

use log::LevelFilter;

/// Log target shared by every record emitted through the `intake_*` macros.
pub const LOG_TARGET: &str = "receipt_intake";

/// Logs a trace-level message under the intake target.
#[macro_export]
macro_rules! intake_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message under the intake target.
#[macro_export]
macro_rules! intake_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an info-level message under the intake target.
#[macro_export]
macro_rules! intake_info {
    ($($arg:tt)*) => {{
        log::info!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message under the intake target.
#[macro_export]
macro_rules! intake_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Logs an error-level message under the intake target.
#[macro_export]
macro_rules! intake_error {
    ($($arg:tt)*) => {{
        log::error!(target: $crate::LOG_TARGET, $($arg)*);
    }};
}

/// Picks the level filter for a run: Debug when verbose, Info otherwise.
pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Initializes a terminal logger for tests.
///
/// Runs at most once per process; later calls, or a logger installed by
/// someone else, leave the existing logger in place.
pub fn initialize_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

        let _ = TermLogger::init(
            level_for(cfg!(debug_assertions)),
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        );
    });
}
