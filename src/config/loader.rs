// file: src/config/loader.rs
// version: 2.1.0
// guid: ba2092f7-d668-4451-9295-7a9b976c6c49

//! Profile file loading and environment variable substitution

use super::DeployProfile;
use crate::Result;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Profile loader with environment variable substitution
pub struct ProfileLoader {
    env_vars: HashMap<String, String>,
}

impl ProfileLoader {
    /// Create a new profile loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Load a deployment profile from a YAML file
    pub fn load_profile<P: AsRef<Path>>(&self, path: P) -> Result<DeployProfile> {
        let content = fs::read_to_string(&path).map_err(|e| {
            crate::error::OvaDeployError::ConfigError(format!(
                "Failed to read profile {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        self.parse_profile(&content)
    }

    /// Parse profile content after `${VAR}` expansion
    pub fn parse_profile(&self, content: &str) -> Result<DeployProfile> {
        let expanded = self.expand_env_vars(content)?;
        let profile: DeployProfile = serde_yaml::from_str(&expanded)?;
        Ok(profile)
    }

    /// Expand environment variables in profile content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
            crate::error::OvaDeployError::ConfigError(format!("Invalid regex pattern: {}", e))
        })?;

        let mut result = content.to_string();
        let mut missing_vars = Vec::new();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];

            if let Some(value) = self.env_vars.get(var_name) {
                result = result.replace(placeholder, value);
            } else if !missing_vars.iter().any(|v| v == var_name) {
                missing_vars.push(var_name.to_string());
            }
        }

        if !missing_vars.is_empty() {
            return Err(crate::error::OvaDeployError::ConfigError(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result)
    }

}

impl Default for ProfileLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl ProfileLoader {
    fn set_env_var(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiskMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_env_var_expansion() {
        let mut loader = ProfileLoader::new();
        loader.set_env_var("TEST_VAR".to_string(), "test_value".to_string());

        let content = "key: ${TEST_VAR}";
        let result = loader.expand_env_vars(content).unwrap();
        assert_eq!(result, "key: test_value");
    }

    #[test]
    fn test_missing_env_var() {
        let loader = ProfileLoader::new();
        let content = "password: ${OVA_DEPLOY_SURELY_UNSET_VAR}";

        let result = loader.expand_env_vars(content);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Missing environment variables: OVA_DEPLOY_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_load_profile() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
user: administrator
password: ${{ESX_PASSWORD}}
ip: 10.0.0.5/24
gateway: 10.0.0.1
disk_mode: eagerZeroedThick
power_on: false
tools:
  ovftool: /usr/lib/vmware-ovftool/ovftool
"#
        )
        .unwrap();

        let mut loader = ProfileLoader::new();
        loader.set_env_var("ESX_PASSWORD".to_string(), "s3cret".to_string());
        let profile = loader.load_profile(file.path())?;

        assert_eq!(profile.user.as_deref(), Some("administrator"));
        assert_eq!(profile.password.as_deref(), Some("s3cret"));
        assert_eq!(profile.disk_mode, Some(DiskMode::EagerZeroedThick));
        assert_eq!(profile.power_on, Some(false));
        assert_eq!(
            profile.tools.unwrap().ovftool.as_deref(),
            Some("/usr/lib/vmware-ovftool/ovftool")
        );

        Ok(())
    }

    #[test]
    fn test_unknown_profile_key_rejected() {
        let loader = ProfileLoader::new();
        let result = loader.parse_profile("hostname: esx01\n");
        assert!(matches!(result, Err(crate::error::OvaDeployError::YamlError(_))));
    }

    #[test]
    fn test_missing_profile_file() {
        let loader = ProfileLoader::new();
        let result = loader.load_profile("/nonexistent/profile.yaml");
        assert!(matches!(result, Err(crate::error::OvaDeployError::ConfigError(_))));
    }
}
