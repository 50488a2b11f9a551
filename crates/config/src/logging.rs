//! Logging configuration for the hearth CLI
//!
//! Compact terminal output on stdout plus an optional append-only debug
//! log file. `RUST_LOG` overrides the default filter.

use crate::Result;
use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 5] = ["hearth", "hearth_engine", "hearth_crypto", "hearth_template", "hearth_config"];

fn default_filter(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the logging system
///
/// * `verbose` - debug level instead of info, with timestamps
/// * `log_file` - also write everything at debug level to this file
///
/// ```ignore
/// init(false, None)?;
/// init(true, Some(Path::new("debug.log")))?;
/// ```
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(level)))
        .map_err(|e| hearth_core::Error::Message(format!("invalid log filter: {e}")))?;

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(true);
    let stdout_layer = if verbose {
        stdout_layer.with_filter(env_filter).boxed()
    } else {
        stdout_layer.without_time().with_filter(env_filter).boxed()
    };

    let file_layer = match log_file {
        Some(log_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            let debug = EnvFilter::try_new(default_filter("debug"))
                .map_err(|e| hearth_core::Error::Message(format!("invalid log filter: {e}")))?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(debug),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_default_filter_covers_all_crates() {
        let filter = default_filter("info");
        assert!(filter.starts_with("hearth=info,"));
        assert!(filter.contains("hearth_engine=info"));
        assert!(EnvFilter::try_new(filter).is_ok());
    }
}
