// file: src/logging/logger.rs
// version: 2.0.0
// guid: e3a65682-9b3c-49fc-971c-859938a0c6bf

//! Logger initialization and configuration

use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Level names for the console, from the `-v`/`-q` flags
pub fn console_level(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Log file name for a run started now
pub fn log_file_name() -> String {
    format!(
        "ova-deploy-{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    )
}

/// Initialize console logging and, when `log_dir` is given, an append-only
/// run log inside it. Returns the log file path.
pub fn init_logger(verbose: bool, quiet: bool, log_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level(verbose, quiet)));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(console_filter);

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let log_path = dir.join(log_file_name());
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;

            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false) // No ANSI colors in log files
                .with_writer(Arc::new(file))
                .with_filter(EnvFilter::new("info,ova_deploy=debug"));
            (Some(layer), Some(log_path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            crate::error::OvaDeployError::ConfigError(format!(
                "Failed to initialize logger: {}",
                e
            ))
        })?;

    if let Some(path) = &log_path {
        tracing::info!("Logging to {}", path.display());
    }

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(false, false), "info");
        assert_eq!(console_level(true, false), "debug");
        assert_eq!(console_level(true, true), "error");
    }

    #[test]
    fn test_log_file_name_shape() {
        let name = log_file_name();
        assert!(name.starts_with("ova-deploy-"));
        assert!(name.ends_with(".log"));
        // ova-deploy-YYYYmmdd_HHMMSS.log
        assert_eq!(name.len(), "ova-deploy-".len() + 15 + ".log".len());
    }

    #[test]
    fn test_init_logger_creates_log_file() {
        // Note: a global subscriber can only be set once per process, so a
        // second initialization in the same test binary is expected to fail.
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");

        let result = init_logger(false, true, Some(&log_dir));

        match result {
            Ok(Some(path)) => assert!(path.is_file()),
            Ok(None) => panic!("Expected a log path"),
            Err(e) => assert!(e.to_string().contains("Failed to initialize logger")),
        }
    }
}
