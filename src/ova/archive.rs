// file: src/ova/archive.rs
// version: 1.1.0
// guid: 1bcdb358-a5bb-486d-923f-fabb168b801e

//! OVA archive extraction, layout discovery and repackaging via tar

use super::descriptor::OvfDescriptor;
use crate::error::OvaDeployError;
use crate::utils::{CommandRunner, ToolInvocation};
use crate::Result;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Descriptor, manifest and certificate names found in an unpacked bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    pub descriptor: String,
    pub manifest: String,
    pub certificate: Option<String>,
}

/// tar front end for OVA bundles
pub struct OvaArchive<'a> {
    runner: &'a dyn CommandRunner,
    tar: String,
}

impl<'a> OvaArchive<'a> {
    pub fn new(runner: &'a dyn CommandRunner, tar: impl Into<String>) -> Self {
        Self {
            runner,
            tar: tar.into(),
        }
    }

    /// Unpack `ova` into `dest`
    pub async fn extract(&self, ova: &Path, dest: &Path) -> Result<()> {
        if !ova.is_file() {
            return Err(OvaDeployError::validation(format!(
                "OVA not found: {}",
                ova.display()
            )));
        }

        info!("Extracting {} into {}", ova.display(), dest.display());
        let invocation = ToolInvocation::new(&self.tar)
            .arg("-xf")
            .arg(ova.to_string_lossy())
            .arg("-C")
            .arg(dest.to_string_lossy());
        self.runner.run(&invocation).await?;
        Ok(())
    }

    /// Write `members` of `dir`, in order, into a new archive at `output`
    pub async fn create(&self, dir: &Path, members: &[String], output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        if output.exists() {
            fs::remove_file(output).await?;
        }

        info!("Packaging {} members into {}", members.len(), output.display());
        let invocation = ToolInvocation::new(&self.tar)
            .arg("--format=ustar")
            .arg("-cf")
            .arg(output.to_string_lossy())
            .arg("-C")
            .arg(dir.to_string_lossy())
            .args(members.iter().cloned());
        self.runner.run(&invocation).await?;
        Ok(output.to_path_buf())
    }

    /// Member names of an archive, in stored order
    pub async fn list(&self, ova: &Path) -> Result<Vec<String>> {
        let invocation = ToolInvocation::new(&self.tar)
            .arg("-tf")
            .arg(ova.to_string_lossy());
        let output = self.runner.run(&invocation).await?;
        Ok(output
            .stdout
            .lines()
            .map(|l| l.trim().trim_start_matches("./").to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

/// Find the single descriptor of an unpacked bundle and its manifest
pub async fn locate_layout(dir: &Path) -> Result<BundleLayout> {
    let mut descriptors = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if name.to_ascii_lowercase().ends_with(".ovf") {
                descriptors.push(name.to_string());
            }
        }
    }
    descriptors.sort();

    let descriptor = match descriptors.len() {
        0 => {
            return Err(OvaDeployError::validation(format!(
                "No .ovf descriptor in {}",
                dir.display()
            )))
        }
        1 => descriptors.remove(0),
        _ => {
            return Err(OvaDeployError::validation(format!(
                "Several descriptors in {}: {}",
                dir.display(),
                descriptors.join(", ")
            )))
        }
    };

    let stem = &descriptor[..descriptor.len() - ".ovf".len()];
    let manifest = format!("{}.mf", stem);
    if !dir.join(&manifest).is_file() {
        return Err(OvaDeployError::validation(format!(
            "Descriptor {} has no manifest {}",
            descriptor, manifest
        )));
    }
    let certificate = Some(format!("{}.cert", stem)).filter(|c| dir.join(c).is_file());

    debug!(
        "Bundle layout: descriptor={}, manifest={}, certificate={:?}",
        descriptor, manifest, certificate
    );
    Ok(BundleLayout {
        descriptor,
        manifest,
        certificate,
    })
}

/// Archive member order for an OVA: descriptor, manifest, certificate, then
/// every referenced file in declaration order. Each member must exist in `dir`.
pub fn discover_members(
    dir: &Path,
    layout: &BundleLayout,
    descriptor: &OvfDescriptor,
) -> Result<Vec<String>> {
    let mut members = vec![layout.descriptor.clone(), layout.manifest.clone()];
    if let Some(cert) = &layout.certificate {
        members.push(cert.clone());
    }

    for reference in descriptor.file_references()? {
        if !members.contains(&reference.href) {
            members.push(reference.href);
        }
    }

    for member in &members {
        let path = Path::new(member);
        if path.components().count() != 1 || member.starts_with('.') {
            return Err(OvaDeployError::validation(format!(
                "Refusing archive member outside the bundle: {}",
                member
            )));
        }
    }

    for member in &members {
        if !dir.join(member).is_file() {
            return Err(OvaDeployError::validation(format!(
                "Bundle member {} is missing from {}",
                member,
                dir.display()
            )));
        }
    }

    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::LocalRunner;
    use tempfile::TempDir;

    const OVF: &str = r#"<Envelope><References>
<File ovf:href="vm-disk1.vmdk" ovf:id="file1" ovf:size="3"/>
<File ovf:href="vm-file1.iso" ovf:id="file2" ovf:size="3"/>
<File ovf:href="vm-file2.nvram" ovf:id="file3" ovf:size="3"/>
</References></Envelope>"#;

    async fn write_bundle(dir: &Path) {
        for (name, body) in [
            ("vm.ovf", OVF),
            ("vm.mf", "SHA256(vm.ovf)= 00\n"),
            ("vm-disk1.vmdk", "dsk"),
            ("vm-file1.iso", "iso"),
            ("vm-file2.nvram", "nvr"),
        ] {
            fs::write(dir.join(name), body).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_locate_layout() {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path()).await;

        let layout = locate_layout(temp_dir.path()).await.unwrap();

        assert_eq!(layout.descriptor, "vm.ovf");
        assert_eq!(layout.manifest, "vm.mf");
        assert_eq!(layout.certificate, None);
    }

    #[tokio::test]
    async fn test_locate_layout_requires_manifest() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("vm.ovf"), OVF).await.unwrap();

        let result = locate_layout(temp_dir.path()).await;

        assert!(matches!(result, Err(OvaDeployError::ValidationError(m)) if m.contains("vm.mf")));
    }

    #[tokio::test]
    async fn test_discover_members_order() {
        // Arrange
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path()).await;
        fs::write(temp_dir.path().join("vm.cert"), "cert").await.unwrap();
        let layout = locate_layout(temp_dir.path()).await.unwrap();
        let descriptor = OvfDescriptor::parse(OVF).unwrap();

        // Act
        let members = discover_members(temp_dir.path(), &layout, &descriptor).unwrap();

        // Assert
        assert_eq!(
            members,
            vec!["vm.ovf", "vm.mf", "vm.cert", "vm-disk1.vmdk", "vm-file1.iso", "vm-file2.nvram"]
        );
    }

    #[tokio::test]
    async fn test_discover_members_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path()).await;
        fs::remove_file(temp_dir.path().join("vm-file2.nvram")).await.unwrap();
        let layout = locate_layout(temp_dir.path()).await.unwrap();
        let descriptor = OvfDescriptor::parse(OVF).unwrap();

        let result = discover_members(temp_dir.path(), &layout, &descriptor);

        assert!(matches!(
            result,
            Err(OvaDeployError::ValidationError(m)) if m.contains("vm-file2.nvram")
        ));
    }

    #[test]
    fn test_discover_members_rejects_path_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let layout = BundleLayout {
            descriptor: "vm.ovf".to_string(),
            manifest: "vm.mf".to_string(),
            certificate: None,
        };
        let descriptor = OvfDescriptor::parse(
            r#"<Envelope><References><File ovf:href="../etc/passwd" ovf:id="f"/></References></Envelope>"#,
        )
        .unwrap();

        let result = discover_members(temp_dir.path(), &layout, &descriptor);

        assert!(matches!(result, Err(OvaDeployError::ValidationError(m)) if m.contains("outside")));
    }

    #[tokio::test]
    async fn test_create_then_extract_with_tar() {
        // Arrange
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_bundle(src.path()).await;
        let runner = LocalRunner::new();
        let archive = OvaArchive::new(&runner, "tar");
        let members = vec!["vm.ovf".to_string(), "vm.mf".to_string(), "vm-file1.iso".to_string()];
        let ova = out.path().join("bundle.ova");

        // Act
        archive.create(src.path(), &members, &ova).await.unwrap();
        let listed = archive.list(&ova).await.unwrap();
        let unpacked = out.path().join("unpacked");
        fs::create_dir_all(&unpacked).await.unwrap();
        archive.extract(&ova, &unpacked).await.unwrap();

        // Assert
        assert_eq!(listed, members);
        assert_eq!(fs::read_to_string(unpacked.join("vm-file1.iso")).await.unwrap(), "iso");
    }

    #[tokio::test]
    async fn test_extract_missing_ova() {
        let temp_dir = TempDir::new().unwrap();
        let runner = LocalRunner::new();
        let archive = OvaArchive::new(&runner, "tar");

        let result = archive
            .extract(&temp_dir.path().join("missing.ova"), temp_dir.path())
            .await;

        assert!(matches!(result, Err(OvaDeployError::ValidationError(_))));
    }
}
