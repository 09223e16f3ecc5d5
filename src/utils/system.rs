// file: src/utils/system.rs
// version: 2.0.0
// guid: d9f46cca-7484-43e3-9995-954b5dc61325

//! System utility functions

use crate::config::ToolPaths;
use std::path::Path;
use tracing::{debug, warn};

/// System utility functions
pub struct SystemUtils;

impl SystemUtils {
    /// Check if a command exists in PATH, or at the given path
    pub fn command_exists(command: &str) -> bool {
        match which::which(command) {
            Ok(path) => {
                debug!("Found {} at {}", command, path.display());
                true
            }
            Err(_) => false,
        }
    }

    /// Names of the external tools this run needs but cannot find
    pub fn check_prerequisites(tools: &ToolPaths, include_deploy: bool) -> Vec<String> {
        let mut required = vec![tools.tar.as_str(), tools.genisoimage.as_str()];
        if include_deploy {
            required.push(tools.ovftool.as_str());
        }

        let missing: Vec<String> = required
            .into_iter()
            .filter(|cmd| !Self::command_exists(cmd))
            .map(str::to_string)
            .collect();

        for cmd in &missing {
            warn!("Required tool not found: {}", cmd);
        }

        missing
    }

    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> crate::Result<u64> {
        Ok(tokio::fs::metadata(path).await?.len())
    }
}
