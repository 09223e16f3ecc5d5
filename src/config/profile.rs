// file: src/config/profile.rs
// version: 1.0.0
// guid: feec6f86-e4c5-414d-a08d-e027d5ee9488

//! Deployment profile structures

use super::DiskMode;
use serde::{Deserialize, Serialize};

/// Optional per-site defaults loaded from a YAML profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployProfile {
    /// Hypervisor account
    pub user: Option<String>,
    /// Hypervisor password, usually `${VAR}` substituted
    pub password: Option<String>,
    /// Guest address in CIDR form
    pub ip: Option<String>,
    /// Guest default gateway
    pub gateway: Option<String>,
    /// Interface name for a freshly written network template
    pub interface: Option<String>,
    pub disk_mode: Option<DiskMode>,
    pub power_on: Option<bool>,
    pub overwrite: Option<bool>,
    /// External tool locations
    pub tools: Option<ToolProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolProfile {
    pub tar: Option<String>,
    pub genisoimage: Option<String>,
    pub ovftool: Option<String>,
}
