// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # ova-deploy
//!
//! Takes a prebuilt OVA appliance whose descriptor references an empty
//! cloud-init ISO, fills that ISO with a seed carrying the guest's static
//! network settings, repairs the descriptor and manifest so the bundle stays
//! internally consistent, repackages it and imports it into a hypervisor
//! with ovftool.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod logging;
pub mod ova;
pub mod pipeline;
pub mod seed;
pub mod utils;

pub use error::{OvaDeployError, Result};

/// Version information for the tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
