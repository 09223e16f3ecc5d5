// file: src/cli/mod.rs
// version: 1.0.0
// guid: 615a9d6a-8530-4b9e-a273-0f2ae511d653

//! Command line interface for ova-deploy

pub mod args;
pub mod commands;

pub use args::Cli;
pub use commands::*;
