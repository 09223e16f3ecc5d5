// file: src/seed/iso.rs
// version: 2.0.0
// guid: 7fe902b9-a76a-4db6-b2c9-f9bc118fc7a7

//! NoCloud seed ISO mastering

use super::templates::SeedFiles;
use crate::error::OvaDeployError;
use crate::utils::{CommandRunner, SystemUtils, ToolInvocation};
use crate::Result;
use std::path::Path;
use tracing::info;

/// Volume label cloud-init's NoCloud datasource looks for
pub const SEED_VOLUME_LABEL: &str = "cidata";

/// Builds seed ISOs with genisoimage (or a compatible mkisofs)
pub struct IsoMaster<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
}

impl<'a> IsoMaster<'a> {
    pub fn new(runner: &'a dyn CommandRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Command line that masters `seed` into `iso_path`
    pub fn invocation(&self, seed: &SeedFiles, iso_path: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.program)
            .arg("-output")
            .arg(iso_path.to_string_lossy())
            .args(["-volid", SEED_VOLUME_LABEL, "-joliet", "-rock"])
            .args(["-input-charset", "utf-8", "-graft-points"])
            .arg(format!("user-data={}", seed.user_data.display()))
            .arg(format!("meta-data={}", seed.meta_data.display()))
            .arg(format!("network-config={}", seed.network_config.display()))
    }

    /// Master the ISO and return its size in bytes
    pub async fn master(&self, seed: &SeedFiles, iso_path: &Path) -> Result<u64> {
        if iso_path.exists() {
            tokio::fs::remove_file(iso_path).await?;
        }

        self.runner.run(&self.invocation(seed, iso_path)).await?;

        if !iso_path.is_file() {
            return Err(OvaDeployError::validation(format!(
                "{} reported success but {} was not written",
                self.program,
                iso_path.display()
            )));
        }
        let size = SystemUtils::file_size(iso_path).await?;
        if size == 0 {
            return Err(OvaDeployError::validation(format!(
                "Mastered ISO {} is empty",
                iso_path.display()
            )));
        }

        info!("Mastered seed ISO {} ({} bytes)", iso_path.display(), size);
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ToolOutput;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes a fixed payload to the `-output` path
    struct FakeMkisofs {
        payload: Vec<u8>,
        calls: Mutex<Vec<ToolInvocation>>,
    }

    #[async_trait::async_trait]
    impl CommandRunner for FakeMkisofs {
        async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            let pos = invocation.args.iter().position(|a| a == "-output").unwrap();
            tokio::fs::write(&invocation.args[pos + 1], &self.payload).await?;
            Ok(ToolOutput::default())
        }
    }

    #[test]
    fn test_invocation_uses_graft_points() {
        // Arrange
        let runner = FakeMkisofs {
            payload: Vec::new(),
            calls: Mutex::new(Vec::new()),
        };
        let master = IsoMaster::new(&runner, "genisoimage");
        let seed = SeedFiles::in_dir(Path::new("/w/image/seed"));

        // Act
        let invocation = master.invocation(&seed, Path::new("/w/image/vm-file1.iso"));

        // Assert
        assert_eq!(invocation.program, "genisoimage");
        assert_eq!(
            invocation.args,
            vec![
                "-output",
                "/w/image/vm-file1.iso",
                "-volid",
                "cidata",
                "-joliet",
                "-rock",
                "-input-charset",
                "utf-8",
                "-graft-points",
                "user-data=/w/image/seed/user-data",
                "meta-data=/w/image/seed/meta-data",
                "network-config=/w/image/seed/network.conf",
            ]
        );
    }

    #[tokio::test]
    async fn test_master_returns_size() {
        let temp_dir = TempDir::new().unwrap();
        let runner = FakeMkisofs {
            payload: vec![0u8; 2048],
            calls: Mutex::new(Vec::new()),
        };
        let master = IsoMaster::new(&runner, "genisoimage");
        let iso: PathBuf = temp_dir.path().join("seed.iso");

        let size = master
            .master(&SeedFiles::in_dir(temp_dir.path()), &iso)
            .await
            .unwrap();

        assert_eq!(size, 2048);
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_master_rejects_empty_output() {
        let temp_dir = TempDir::new().unwrap();
        let runner = FakeMkisofs {
            payload: Vec::new(),
            calls: Mutex::new(Vec::new()),
        };
        let master = IsoMaster::new(&runner, "genisoimage");

        let result = master
            .master(
                &SeedFiles::in_dir(temp_dir.path()),
                &temp_dir.path().join("seed.iso"),
            )
            .await;

        assert!(matches!(result, Err(OvaDeployError::ValidationError(_))));
    }
}
