// file: src/seed/mod.rs
// version: 1.0.0
// guid: 87389415-04e4-45c4-96d3-d3a9197ec44c

//! Cloud-init NoCloud seed: templates, network injection and ISO mastering

pub mod iso;
pub mod network;
pub mod templates;

pub use iso::IsoMaster;
pub use network::{address_warnings, inject_network, verify_network};
pub use templates::{SeedFiles, SeedTemplates};
