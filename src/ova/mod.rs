// file: src/ova/mod.rs
// version: 1.0.0
// guid: fb4e9931-8111-4237-beb8-d93937b80d09

//! OVA bundle handling
//!
//! This module handles:
//! - Unpacking and repackaging the tar container
//! - Locating the descriptor, manifest and referenced files
//! - Patching descriptor file sizes and manifest digests

pub mod archive;
pub mod descriptor;
pub mod manifest;

pub use archive::{discover_members, locate_layout, BundleLayout, OvaArchive};
pub use descriptor::{FileReference, OvfDescriptor};
pub use manifest::{Manifest, ManifestEntry};
