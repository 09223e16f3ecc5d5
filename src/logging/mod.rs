// file: src/logging/mod.rs
// version: 1.0.0
// guid: 451b6d1c-97ca-46a8-a9ff-c1dd362b7f90

//! Logging system for ova-deploy

pub mod logger;

pub use logger::init_logger;
