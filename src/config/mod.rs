// file: src/config/mod.rs
// version: 2.1.0
// guid: e52af988-9820-4b43-94d3-d69d29aed27a

//! Deployment configuration
//!
//! A [`DeployConfig`] is resolved once from built-in defaults, an optional
//! profile file and the command line, then passed by reference through every
//! pipeline stage.

pub mod loader;
pub mod profile;

pub use loader::ProfileLoader;
pub use profile::{DeployProfile, ToolProfile};

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default administrative account on the hypervisor
pub const DEFAULT_USER: &str = "root";
/// Default guest address when `--ip` is not given
pub const DEFAULT_IP: &str = "192.168.1.10/24";
/// Default guest interface written into a fresh network template
pub const DEFAULT_INTERFACE: &str = "eth0";
/// Name of the repackaged archive inside the working directory
pub const OUTPUT_OVA_NAME: &str = "image.ova";

/// Disk provisioning mode passed to ovftool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DiskMode {
    #[default]
    #[serde(rename = "thin")]
    Thin,
    #[serde(rename = "thick")]
    Thick,
    #[serde(rename = "eagerZeroedThick")]
    EagerZeroedThick,
}

impl DiskMode {
    /// Get the disk mode as ovftool spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskMode::Thin => "thin",
            DiskMode::Thick => "thick",
            DiskMode::EagerZeroedThick => "eagerZeroedThick",
        }
    }
}

/// Locations of the external binaries the pipeline drives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub tar: String,
    pub genisoimage: String,
    pub ovftool: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            tar: "tar".to_string(),
            genisoimage: "genisoimage".to_string(),
            ovftool: "ovftool".to_string(),
        }
    }
}

/// Fully resolved parameters of one deployment run
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Hypervisor address
    pub host: String,
    /// Hypervisor account
    pub user: String,
    /// Hypervisor password; prompted for when absent
    pub password: Option<String>,
    /// Source OVA
    pub ova: PathBuf,
    /// Name of the VM on the hypervisor
    pub vm_name: String,
    /// Guest address in CIDR form, carried verbatim
    pub ip: String,
    /// Guest default gateway, may be empty
    pub gateway: String,
    /// Interface name used when a network template is first written
    pub interface: String,
    /// Replace an existing VM of the same name
    pub overwrite: bool,
    pub power_on: bool,
    pub disk_mode: DiskMode,
    /// Root of `config/`, `image/` and `logs/`
    pub workdir: PathBuf,
    /// Repackaged OVA
    pub output: PathBuf,
    pub tools: ToolPaths,
    /// Leave the workspace untouched when a stage fails
    pub keep_failed: bool,
    /// Stop after repackaging
    pub skip_deploy: bool,
}

impl DeployConfig {
    /// Create a configuration with built-in defaults for everything but the
    /// two mandatory parameters
    pub fn new(host: impl Into<String>, ova: impl Into<PathBuf>) -> Result<Self> {
        let ova = ova.into();
        let vm_name = derive_vm_name(&ova)?;
        let workdir = PathBuf::from(".");

        Ok(Self {
            host: host.into(),
            user: DEFAULT_USER.to_string(),
            password: None,
            ova,
            vm_name,
            ip: DEFAULT_IP.to_string(),
            gateway: String::new(),
            interface: DEFAULT_INTERFACE.to_string(),
            overwrite: false,
            power_on: true,
            disk_mode: DiskMode::default(),
            output: workdir.join(OUTPUT_OVA_NAME),
            workdir,
            tools: ToolPaths::default(),
            keep_failed: false,
            skip_deploy: false,
        })
    }

    /// Apply the values a profile sets; unset profile fields keep the current value
    pub fn apply_profile(&mut self, profile: &DeployProfile) {
        if let Some(user) = &profile.user {
            self.user = user.clone();
        }
        if let Some(password) = &profile.password {
            self.password = Some(password.clone());
        }
        if let Some(ip) = &profile.ip {
            self.ip = ip.clone();
        }
        if let Some(gateway) = &profile.gateway {
            self.gateway = gateway.clone();
        }
        if let Some(interface) = &profile.interface {
            self.interface = interface.clone();
        }
        if let Some(disk_mode) = profile.disk_mode {
            self.disk_mode = disk_mode;
        }
        if let Some(power_on) = profile.power_on {
            self.power_on = power_on;
        }
        if let Some(overwrite) = profile.overwrite {
            self.overwrite = overwrite;
        }
        if let Some(tools) = &profile.tools {
            if let Some(tar) = &tools.tar {
                self.tools.tar = tar.clone();
            }
            if let Some(genisoimage) = &tools.genisoimage {
                self.tools.genisoimage = genisoimage.clone();
            }
            if let Some(ovftool) = &tools.ovftool {
                self.tools.ovftool = ovftool.clone();
            }
        }
    }

    /// Move the working directory, keeping a default output path next to it
    pub fn set_workdir(&mut self, workdir: impl Into<PathBuf>) {
        let default_output = self.output == self.workdir.join(OUTPUT_OVA_NAME);
        self.workdir = workdir.into();
        if default_output {
            self.output = self.workdir.join(OUTPUT_OVA_NAME);
        }
    }

    /// Seed templates, created once and never overwritten
    pub fn config_dir(&self) -> PathBuf {
        self.workdir.join("config")
    }

    /// Scratch area, purged at the start of every run
    pub fn image_dir(&self) -> PathBuf {
        self.workdir.join("image")
    }

    /// Per-run rendered seed files
    pub fn seed_dir(&self) -> PathBuf {
        self.image_dir().join("seed")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.workdir.join("logs")
    }
}

/// Derive a VM name from an OVA path by stripping everything from the first
/// dot of the file name (`foo.bar.ova` becomes `foo`)
pub fn derive_vm_name(ova: &Path) -> Result<String> {
    let file_name = ova
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            crate::error::OvaDeployError::config(format!(
                "Cannot derive a VM name from {}",
                ova.display()
            ))
        })?;

    let stem = file_name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        return Err(crate::error::OvaDeployError::config(format!(
            "Cannot derive a VM name from {}; pass --vm_name",
            ova.display()
        )));
    }

    Ok(stem.to_string())
}
