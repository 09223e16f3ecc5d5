// file: src/deploy/mod.rs
// version: 1.0.0
// guid: 47d78617-47cd-4352-a693-e83ee5ccf580

//! Hypervisor deployment

pub mod ovftool;

pub use ovftool::{Locator, OvfTool};
