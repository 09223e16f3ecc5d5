// file: src/pipeline/mod.rs
// version: 1.1.0
// guid: 0561dd0e-3f57-4b77-b6e7-1f7acffce73f

//! Deployment pipeline
//!
//! Runs every [`Stage`] in order, stopping at the first failure. A failed run
//! clears the image workspace and any half-written output archive unless the
//! configuration asks to keep them.

pub mod stage;

pub use stage::Stage;

use crate::config::DeployConfig;
use crate::deploy::OvfTool;
use crate::error::OvaDeployError;
use crate::ova::{
    discover_members, locate_layout, BundleLayout, FileReference, Manifest, ManifestEntry,
    OvaArchive, OvfDescriptor,
};
use crate::seed::{address_warnings, IsoMaster, SeedFiles, SeedTemplates};
use crate::utils::{CommandRunner, CryptoUtils, HashAlgorithm};
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, info_span, warn, Instrument};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub output: PathBuf,
    pub vm_name: String,
    pub iso: String,
    pub iso_size: u64,
    pub members: Vec<String>,
    pub deployed: bool,
}

/// Intermediate results handed from one stage to the next
#[derive(Default)]
struct RunState {
    layout: Option<BundleLayout>,
    descriptor: Option<OvfDescriptor>,
    seed: Option<SeedFiles>,
    iso: Option<FileReference>,
    iso_size: u64,
    members: Vec<String>,
    output_complete: bool,
    deployed: bool,
}

fn missing(what: &str) -> OvaDeployError {
    OvaDeployError::validation(format!("{} is not available yet", what))
}

pub struct Pipeline<'a> {
    config: &'a DeployConfig,
    runner: &'a dyn CommandRunner,
    password: Option<String>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a DeployConfig,
        runner: &'a dyn CommandRunner,
        password: Option<String>,
    ) -> Self {
        Self {
            config,
            runner,
            password,
        }
    }

    /// Run every stage; on failure run the cleanup hook and return the error
    /// tagged with the failing stage
    pub async fn run(&self) -> Result<PipelineReport> {
        let mut state = RunState::default();

        for stage in Stage::ALL {
            let span = info_span!("stage", name = stage.name());
            info!(parent: &span, "==> {}", stage.description());

            let result = self.execute(stage, &mut state).instrument(span).await;
            if let Err(e) = result {
                tracing::error!("Stage {} failed: {}", stage, e);
                self.cleanup(&state).await;
                return Err(OvaDeployError::in_stage(stage.name(), e));
            }
        }

        Ok(PipelineReport {
            output: self.config.output.clone(),
            vm_name: self.config.vm_name.clone(),
            iso: state.iso.map(|r| r.href).unwrap_or_default(),
            iso_size: state.iso_size,
            members: state.members,
            deployed: state.deployed,
        })
    }

    async fn execute(&self, stage: Stage, state: &mut RunState) -> Result<()> {
        match stage {
            Stage::PrepareWorkspace => self.prepare_workspace().await,
            Stage::BootstrapSeeds => self.bootstrap_seeds().await,
            Stage::PurgeWorkspace => self.purge_workspace().await,
            Stage::Unpack => self.unpack(state).await,
            Stage::InjectNetwork => self.inject_network(state).await,
            Stage::MasterIso => self.master_iso(state).await,
            Stage::PatchDescriptor => self.patch_descriptor(state).await,
            Stage::PatchManifest => self.patch_manifest(state).await,
            Stage::Repackage => self.repackage(state).await,
            Stage::Deploy => self.deploy(state).await,
        }
    }

    async fn prepare_workspace(&self) -> Result<()> {
        fs::create_dir_all(self.config.config_dir()).await?;
        fs::create_dir_all(self.config.image_dir()).await?;
        debug!("Workspace ready under {}", self.config.workdir.display());
        Ok(())
    }

    async fn bootstrap_seeds(&self) -> Result<()> {
        let templates = SeedTemplates::new(self.config.config_dir());
        let created = templates.bootstrap(&self.config.interface).await?;
        if created.is_empty() {
            info!("Using existing seed templates in {}", self.config.config_dir().display());
        }
        Ok(())
    }

    async fn purge_workspace(&self) -> Result<()> {
        let image_dir = self.config.image_dir();
        if is_within(&self.config.ova, &image_dir).await {
            return Err(OvaDeployError::config(format!(
                "Source OVA {} lives inside the workspace {} that is purged on every run",
                self.config.ova.display(),
                image_dir.display()
            )));
        }
        if is_same_file(&self.config.ova, &self.config.output).await {
            return Err(OvaDeployError::config(format!(
                "Source OVA {} is also the output archive; choose another --output",
                self.config.ova.display()
            )));
        }
        let removed = clear_dir(&image_dir).await?;
        debug!("Removed {} entries from {}", removed, image_dir.display());
        Ok(())
    }

    async fn unpack(&self, state: &mut RunState) -> Result<()> {
        let image_dir = self.config.image_dir();
        OvaArchive::new(self.runner, &self.config.tools.tar)
            .extract(&self.config.ova, &image_dir)
            .await?;

        let layout = locate_layout(&image_dir).await?;
        let descriptor = OvfDescriptor::load(&image_dir.join(&layout.descriptor)).await?;
        info!(
            "Found descriptor {} referencing {} files",
            layout.descriptor,
            descriptor.file_references()?.len()
        );

        state.layout = Some(layout);
        state.descriptor = Some(descriptor);
        Ok(())
    }

    async fn inject_network(&self, state: &mut RunState) -> Result<()> {
        for warning in address_warnings(&self.config.ip, &self.config.gateway) {
            warn!("{}; passing it through unchanged", warning);
        }

        let templates = SeedTemplates::new(self.config.config_dir());
        let seed = templates
            .render(&self.config.seed_dir(), &self.config.ip, &self.config.gateway)
            .await?;
        state.seed = Some(seed);
        Ok(())
    }

    async fn master_iso(&self, state: &mut RunState) -> Result<()> {
        let descriptor = state.descriptor.as_ref().ok_or_else(|| missing("descriptor"))?;
        let seed = state.seed.as_ref().ok_or_else(|| missing("seed"))?;

        let iso = descriptor.iso_reference()?;
        let iso_path = self.config.image_dir().join(&iso.href);
        let size = IsoMaster::new(self.runner, &self.config.tools.genisoimage)
            .master(seed, &iso_path)
            .await?;

        state.iso = Some(iso);
        state.iso_size = size;
        Ok(())
    }

    async fn patch_descriptor(&self, state: &mut RunState) -> Result<()> {
        let layout = state.layout.as_ref().ok_or_else(|| missing("layout"))?;
        let iso = state.iso.as_ref().ok_or_else(|| missing("ISO"))?;
        let descriptor = state.descriptor.as_mut().ok_or_else(|| missing("descriptor"))?;

        descriptor.set_file_size(&iso.id, state.iso_size)?;
        descriptor
            .save(&self.config.image_dir().join(&layout.descriptor))
            .await?;
        info!(
            "Descriptor {} now declares {} as {} bytes (was {:?})",
            layout.descriptor, iso.href, state.iso_size, iso.size
        );
        Ok(())
    }

    async fn patch_manifest(&self, state: &mut RunState) -> Result<()> {
        let layout = state.layout.as_ref().ok_or_else(|| missing("layout"))?;
        let iso = state.iso.as_ref().ok_or_else(|| missing("ISO"))?;
        let image_dir = self.config.image_dir();
        let manifest_path = image_dir.join(&layout.manifest);

        let mut manifest = Manifest::load(&manifest_path).await?;

        if manifest.entry(&iso.href).is_some() {
            manifest.refresh(&image_dir, &iso.href).await?;
        } else {
            // Follow the descriptor's line so the manifest keeps one algorithm
            let algorithm = manifest
                .entry(&layout.descriptor)
                .map(|e| e.algorithm)
                .unwrap_or(HashAlgorithm::Sha256);
            warn!(
                "Manifest has no entry for {}; adding a {} line",
                iso.href,
                algorithm.as_str()
            );
            let digest =
                CryptoUtils::calculate_file_checksum(&image_dir.join(&iso.href), algorithm).await?;
            manifest.upsert(ManifestEntry::new(algorithm, &iso.href, digest));
        }
        // The descriptor was rewritten in the previous stage
        manifest.refresh(&image_dir, &layout.descriptor).await?;

        for file in [&iso.href, &layout.descriptor] {
            if !manifest.verify(&image_dir, file).await? {
                return Err(OvaDeployError::manifest(format!(
                    "Digest for {} does not match after update",
                    file
                )));
            }
        }

        manifest.save(&manifest_path).await?;
        info!("Manifest {} updated", layout.manifest);
        Ok(())
    }

    async fn repackage(&self, state: &mut RunState) -> Result<()> {
        let layout = state.layout.as_ref().ok_or_else(|| missing("layout"))?;
        let descriptor = state.descriptor.as_ref().ok_or_else(|| missing("descriptor"))?;
        let image_dir = self.config.image_dir();

        let members = discover_members(&image_dir, layout, descriptor)?;
        let archive = OvaArchive::new(self.runner, &self.config.tools.tar);
        archive
            .create(&image_dir, &members, &self.config.output)
            .await?;

        let stored = archive.list(&self.config.output).await?;
        if stored.first() != Some(&layout.descriptor) {
            return Err(OvaDeployError::validation(format!(
                "{} does not start with its descriptor",
                self.config.output.display()
            )));
        }

        info!("Packaged {} ({})", self.config.output.display(), members.join(", "));
        state.members = members;
        state.output_complete = true;
        Ok(())
    }

    async fn deploy(&self, state: &mut RunState) -> Result<()> {
        if self.config.skip_deploy {
            info!("Skipping deployment; {} is ready", self.config.output.display());
            return Ok(());
        }

        let password = self.password.as_deref().ok_or_else(|| {
            OvaDeployError::config("A password is required to deploy")
        })?;
        OvfTool::new(self.runner, &self.config.tools.ovftool)
            .deploy(self.config, password, &self.config.output)
            .await?;
        state.deployed = true;
        Ok(())
    }

    /// Failure hook: drop intermediate files and an unfinished output archive
    async fn cleanup(&self, state: &RunState) {
        if self.config.keep_failed {
            warn!(
                "Leaving workspace {} as is for inspection",
                self.config.image_dir().display()
            );
            return;
        }

        let image_dir = self.config.image_dir();
        if image_dir.is_dir() && !is_within(&self.config.ova, &image_dir).await {
            match clear_dir(&image_dir).await {
                Ok(n) => info!("Cleanup removed {} entries from {}", n, image_dir.display()),
                Err(e) => warn!("Cleanup of {} failed: {}", image_dir.display(), e),
            }
        }

        if !state.output_complete
            && self.config.output.is_file()
            && !is_same_file(&self.config.ova, &self.config.output).await
        {
            if let Err(e) = fs::remove_file(&self.config.output).await {
                warn!("Could not remove {}: {}", self.config.output.display(), e);
            }
        }
    }
}

/// Remove every entry inside `dir`, keeping `dir` itself
async fn clear_dir(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path).await?;
        }
        removed += 1;
    }
    Ok(removed)
}

async fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn is_within(path: &Path, dir: &Path) -> bool {
    match (fs::canonicalize(path).await, fs::canonicalize(dir).await) {
        (Ok(path), Ok(dir)) => path.starts_with(dir),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clear_dir_keeps_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("image");
        fs::create_dir_all(dir.join("seed")).await.unwrap();
        fs::write(dir.join("a.vmdk"), "x").await.unwrap();
        fs::write(dir.join("seed").join("user-data"), "x").await.unwrap();

        let removed = clear_dir(&dir).await.unwrap();

        assert_eq!(removed, 2);
        assert!(dir.is_dir());
        assert!(fs::read_dir(&dir).await.unwrap().next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_is_within() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("image");
        fs::create_dir_all(&dir).await.unwrap();
        fs::write(dir.join("vm.ova"), "x").await.unwrap();
        fs::write(temp_dir.path().join("vm.ova"), "x").await.unwrap();

        assert!(is_within(&dir.join("vm.ova"), &dir).await);
        assert!(!is_within(&temp_dir.path().join("vm.ova"), &dir).await);
        assert!(!is_within(&temp_dir.path().join("missing.ova"), &dir).await);
    }

    #[tokio::test]
    async fn test_is_same_file() {
        let temp_dir = TempDir::new().unwrap();
        let ova = temp_dir.path().join("image.ova");
        fs::write(&ova, "x").await.unwrap();

        assert!(is_same_file(&ova, &temp_dir.path().join(".").join("image.ova")).await);
        assert!(!is_same_file(&ova, &temp_dir.path().join("other.ova")).await);
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ALL.len(), 10);
        assert_eq!(Stage::ALL[0], Stage::PrepareWorkspace);
        assert_eq!(Stage::ALL[9], Stage::Deploy);
        assert_eq!(Stage::PatchManifest.to_string(), "patch-manifest");
    }
}
