// file: src/utils/mod.rs
// version: 2.0.0
// guid: ef453bcc-fe3b-4f62-9fe3-c86383954842

//! Utility modules for system operations

pub mod crypto;
pub mod process;
pub mod system;

pub use crypto::{CryptoUtils, HashAlgorithm};
pub use process::{CommandRunner, LocalRunner, ToolInvocation, ToolOutput};
pub use system::SystemUtils;
