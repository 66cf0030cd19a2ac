//! Logging initialization for the hostfacts binary.
//!
//! stdout is reserved for the fact document; all log output goes to stderr.
//! The filter honors `HOSTFACTS_LOG`, then `RUST_LOG`, then the verbosity
//! flags from the CLI.

use std::io::IsTerminal;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs.
pub fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = std::env::var("HOSTFACTS_LOG")
        .ok()
        .and_then(|v| EnvFilter::try_new(v).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(format!("hf_core={}", default_level)));

    let use_ansi = std::io::stderr().is_terminal();

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(use_ansi)
        .init();
}
