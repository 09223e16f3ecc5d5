// file: src/error.rs
// version: 3.0.0
// guid: 429ffea1-6d0c-4796-b19e-dca5bfe01daf

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, OvaDeployError>;

/// Error types for OVA packaging and deployment
#[derive(Error, Debug)]
pub enum OvaDeployError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Injection error: {0}")]
    InjectionError(String),

    #[error("Descriptor error: {0}")]
    DescriptorError(String),

    #[error("Manifest error: {0}")]
    ManifestError(String),

    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    #[error("Command `{command}` failed with exit code {exit_code:?}: {stderr}")]
    ProcessError {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: Box<OvaDeployError>,
    },

    #[error("Interrupted by user")]
    Interrupted,
}

impl OvaDeployError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a new injection error
    pub fn injection(msg: impl Into<String>) -> Self {
        Self::InjectionError(msg.into())
    }

    /// Create a new descriptor error
    pub fn descriptor(msg: impl Into<String>) -> Self {
        Self::DescriptorError(msg.into())
    }

    /// Create a new manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::ManifestError(msg.into())
    }

    /// Wrap an error with the pipeline stage it came from
    pub fn in_stage(stage: &'static str, source: OvaDeployError) -> Self {
        Self::StageFailed {
            stage,
            source: Box::new(source),
        }
    }

    /// Innermost error, skipping stage wrappers
    pub fn root_cause(&self) -> &OvaDeployError {
        match self {
            Self::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors() {
        assert!(matches!(OvaDeployError::config("x"), OvaDeployError::ConfigError(m) if m == "x"));
        assert!(matches!(
            OvaDeployError::injection("gateway4"),
            OvaDeployError::InjectionError(_)
        ));
    }

    #[test]
    fn test_stage_wrapper_display_and_root_cause() {
        // Arrange
        let inner = OvaDeployError::manifest("no entry for disk.iso");

        // Act
        let err = OvaDeployError::in_stage("patch-manifest", inner);

        // Assert
        assert_eq!(
            err.to_string(),
            "Stage 'patch-manifest' failed: Manifest error: no entry for disk.iso"
        );
        assert!(matches!(err.root_cause(), OvaDeployError::ManifestError(_)));
    }

    #[test]
    fn test_process_error_display() {
        let err = OvaDeployError::ProcessError {
            command: "tar -xf a.ova".to_string(),
            exit_code: Some(2),
            stderr: "not in gzip format".to_string(),
        };
        assert!(err.to_string().contains("exit code Some(2)"));
    }
}
