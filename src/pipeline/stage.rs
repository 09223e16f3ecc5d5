// file: src/pipeline/stage.rs
// version: 1.0.0
// guid: be6b80d4-9f8b-449a-99f2-e3a2958352f2

//! Pipeline stages in execution order

/// One step of a deployment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PrepareWorkspace,
    BootstrapSeeds,
    PurgeWorkspace,
    Unpack,
    InjectNetwork,
    MasterIso,
    PatchDescriptor,
    PatchManifest,
    Repackage,
    Deploy,
}

impl Stage {
    /// Every stage, in the order they run
    pub const ALL: [Stage; 10] = [
        Stage::PrepareWorkspace,
        Stage::BootstrapSeeds,
        Stage::PurgeWorkspace,
        Stage::Unpack,
        Stage::InjectNetwork,
        Stage::MasterIso,
        Stage::PatchDescriptor,
        Stage::PatchManifest,
        Stage::Repackage,
        Stage::Deploy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::PrepareWorkspace => "prepare-workspace",
            Stage::BootstrapSeeds => "bootstrap-seeds",
            Stage::PurgeWorkspace => "purge-workspace",
            Stage::Unpack => "unpack",
            Stage::InjectNetwork => "inject-network",
            Stage::MasterIso => "master-iso",
            Stage::PatchDescriptor => "patch-descriptor",
            Stage::PatchManifest => "patch-manifest",
            Stage::Repackage => "repackage",
            Stage::Deploy => "deploy",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::PrepareWorkspace => "Preparing working directories",
            Stage::BootstrapSeeds => "Ensuring cloud-init seed templates",
            Stage::PurgeWorkspace => "Clearing image workspace",
            Stage::Unpack => "Unpacking OVA",
            Stage::InjectNetwork => "Rendering network configuration",
            Stage::MasterIso => "Mastering seed ISO",
            Stage::PatchDescriptor => "Updating descriptor file size",
            Stage::PatchManifest => "Updating manifest digests",
            Stage::Repackage => "Repackaging OVA",
            Stage::Deploy => "Deploying to hypervisor",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
