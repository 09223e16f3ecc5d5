// file: src/deploy/ovftool.rs
// version: 1.1.0
// guid: d9783cbf-1eab-4cee-907b-2373a36555dd

//! Upload and power-on through VMware ovftool

use crate::config::DeployConfig;
use crate::error::OvaDeployError;
use crate::utils::{CommandRunner, ToolInvocation};
use crate::Result;
use std::path::Path;
use tracing::info;
use url::Url;

/// `vi://` target locator with percent-encoded credentials
#[derive(Debug, Clone)]
pub struct Locator {
    url: Url,
}

impl Locator {
    pub fn new(host: &str, user: &str, password: &str) -> Result<Self> {
        let mut url = Url::parse(&format!("vi://{}", host)).map_err(|e| {
            OvaDeployError::config(format!("Invalid host '{}': {}", host, e))
        })?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(OvaDeployError::config(format!("Invalid host '{}'", host)));
        }
        url.set_username(user)
            .map_err(|_| OvaDeployError::config(format!("Cannot use user '{}' in locator", user)))?;
        url.set_password(Some(password))
            .map_err(|_| OvaDeployError::config("Cannot use password in locator"))?;
        Ok(Self { url })
    }

    /// Password as it appears inside the locator
    pub fn encoded_password(&self) -> Option<&str> {
        self.url.password()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// ovftool front end
pub struct OvfTool<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
}

impl<'a> OvfTool<'a> {
    pub fn new(runner: &'a dyn CommandRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// Command line deploying `ova` per `config`; the password is registered
    /// for redaction in both raw and encoded form
    pub fn invocation(
        &self,
        config: &DeployConfig,
        password: &str,
        ova: &Path,
    ) -> Result<ToolInvocation> {
        let locator = Locator::new(&config.host, &config.user, password)?;

        let mut invocation = ToolInvocation::new(&self.program)
            .echo(true)
            .redact(password)
            .arg("--acceptAllEulas")
            .arg("--noSSLVerify")
            .arg(format!("--name={}", config.vm_name))
            .arg(format!("--diskMode={}", config.disk_mode.as_str()));

        if let Some(encoded) = locator.encoded_password() {
            invocation = invocation.redact(encoded);
        }
        if config.power_on {
            invocation = invocation.arg("--powerOn");
        }
        if config.overwrite {
            invocation = invocation.args(["--overwrite", "--powerOffTarget"]);
        }

        Ok(invocation
            .arg(ova.to_string_lossy())
            .arg(locator.as_str()))
    }

    pub async fn deploy(&self, config: &DeployConfig, password: &str, ova: &Path) -> Result<()> {
        info!(
            "Deploying {} as VM '{}' to {} (power on: {}, overwrite: {})",
            ova.display(),
            config.vm_name,
            config.host,
            config.power_on,
            config.overwrite
        );
        let invocation = self.invocation(config, password, ova)?;
        self.runner.run(&invocation).await?;
        info!("VM '{}' deployed to {}", config.vm_name, config.host);
        Ok(())
    }
}
