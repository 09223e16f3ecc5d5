// file: src/seed/templates.rs
// version: 1.0.0
// guid: 9a10d28a-8459-4c18-8711-5309fce62b6e

//! Cloud-init seed templates

use super::network::{inject_network, verify_network};
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub const META_DATA: &str = "meta-data";
pub const USER_DATA: &str = "user-data";
pub const NETWORK_CONF: &str = "network.conf";

/// Seed files rendered for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFiles {
    pub user_data: PathBuf,
    pub meta_data: PathBuf,
    pub network_config: PathBuf,
}

impl SeedFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            user_data: dir.join(USER_DATA),
            meta_data: dir.join(META_DATA),
            network_config: dir.join(NETWORK_CONF),
        }
    }
}

/// Templates kept under `config/`
pub struct SeedTemplates {
    config_dir: PathBuf,
}

impl SeedTemplates {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn files(&self) -> SeedFiles {
        SeedFiles::in_dir(&self.config_dir)
    }

    /// Write the default templates that do not exist yet. Existing files are
    /// never touched. Returns the files that were created.
    pub async fn bootstrap(&self, interface: &str) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.config_dir).await?;
        let files = self.files();

        let defaults = [
            (files.meta_data, default_meta_data()),
            (files.user_data, default_user_data()),
            (files.network_config, default_network_config(interface)),
        ];

        let mut created = Vec::new();
        for (path, content) in defaults {
            if write_if_absent(&path, &content).await? {
                info!("Created default seed template {}", path.display());
                created.push(path);
            } else {
                debug!("Keeping existing seed template {}", path.display());
            }
        }

        Ok(created)
    }

    /// Render this run's seed into `seed_dir`: user-data and meta-data are
    /// copied, the network template gets `ip` and `gateway` injected. The
    /// templates themselves are not modified.
    pub async fn render(&self, seed_dir: &Path, ip: &str, gateway: &str) -> Result<SeedFiles> {
        fs::create_dir_all(seed_dir).await?;
        let source = self.files();
        let target = SeedFiles::in_dir(seed_dir);

        fs::copy(&source.user_data, &target.user_data).await?;
        fs::copy(&source.meta_data, &target.meta_data).await?;

        let template = fs::read_to_string(&source.network_config).await?;
        let rendered = inject_network(&template, ip, gateway)?;
        let interface = verify_network(&rendered, ip, gateway)?;
        fs::write(&target.network_config, rendered).await?;

        info!(
            "Rendered network config: {} on {} via {}",
            ip,
            interface,
            if gateway.is_empty() { "<none>" } else { gateway }
        );
        Ok(target)
    }
}

async fn write_if_absent(path: &Path, content: &str) -> Result<bool> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await;

    match file {
        Ok(mut file) => {
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn default_meta_data() -> String {
    "instance-id: iid-ova-deploy\nlocal-hostname: appliance\n".to_string()
}

fn default_user_data() -> String {
    r#"#cloud-config
bootcmd:
  - [ sh, -c, 'echo "ova-deploy seed attached" > /dev/console' ]
runcmd:
  - [ netplan, apply ]
"#
    .to_string()
}

fn default_network_config(interface: &str) -> String {
    format!(
        r#"version: 2
ethernets:
  {}:
    dhcp4: false
    addresses: [{}]
    gateway4: 192.168.1.1
    nameservers:
      addresses: [8.8.8.8, 1.1.1.1]
"#,
        interface,
        crate::config::DEFAULT_IP
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bootstrap_creates_defaults() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let templates = SeedTemplates::new(temp_dir.path().join("config"));

        // Act
        let created = templates.bootstrap("ens192").await.unwrap();

        // Assert
        assert_eq!(created.len(), 3);
        let network = fs::read_to_string(templates.files().network_config).await.unwrap();
        assert!(network.contains("  ens192:\n"));
        let user_data = fs::read_to_string(templates.files().user_data).await.unwrap();
        assert!(user_data.starts_with("#cloud-config"));
    }

    #[tokio::test]
    async fn test_bootstrap_never_overwrites() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let templates = SeedTemplates::new(temp_dir.path().join("config"));
        templates.bootstrap("eth0").await.unwrap();
        let custom = "version: 2\nethernets:\n  lan0:\n    addresses: [1.2.3.4/8]\n    gateway4: 1.0.0.1\n";
        fs::write(templates.files().network_config, custom).await.unwrap();

        // Act
        let created = templates.bootstrap("eth0").await.unwrap();

        // Assert
        assert!(created.is_empty());
        assert_eq!(
            fs::read_to_string(templates.files().network_config).await.unwrap(),
            custom
        );
    }

    #[tokio::test]
    async fn test_render_leaves_template_untouched() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        let templates = SeedTemplates::new(temp_dir.path().join("config"));
        templates.bootstrap("eth0").await.unwrap();
        let before = fs::read_to_string(templates.files().network_config).await.unwrap();
        let seed_dir = temp_dir.path().join("image").join("seed");

        // Act
        let seed = templates
            .render(&seed_dir, "172.20.20.18/24", "172.20.20.1")
            .await
            .unwrap();

        // Assert
        let rendered = fs::read_to_string(&seed.network_config).await.unwrap();
        assert!(rendered.contains("    addresses: [172.20.20.18/24]\n"));
        assert!(rendered.contains("    gateway4: 172.20.20.1\n"));
        assert!(seed.user_data.is_file());
        assert!(seed.meta_data.is_file());
        assert_eq!(
            fs::read_to_string(templates.files().network_config).await.unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_render_reports_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let templates = SeedTemplates::new(temp_dir.path().join("config"));
        templates.bootstrap("eth0").await.unwrap();
        fs::write(
            templates.files().network_config,
            "version: 2\nethernets:\n  eth0:\n    dhcp4: true\n",
        )
        .await
        .unwrap();

        let result = templates
            .render(&temp_dir.path().join("seed"), "10.0.0.5/24", "10.0.0.1")
            .await;

        assert!(matches!(
            result,
            Err(crate::error::OvaDeployError::InjectionError(_))
        ));
    }
}
