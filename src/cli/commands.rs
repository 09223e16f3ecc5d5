// file: src/cli/commands.rs
// version: 2.1.0
// guid: 74d48294-3117-4fc4-b836-56ee0268abae

//! Command implementations for the CLI

use super::args::Cli;
use crate::{
    config::{DeployConfig, ProfileLoader, ToolPaths},
    error::OvaDeployError,
    pipeline::{Pipeline, PipelineReport},
    utils::{LocalRunner, SystemUtils},
    Result,
};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

fn expand(value: &str) -> Result<String> {
    shellexpand::full(value)
        .map(|v| v.into_owned())
        .map_err(|e| OvaDeployError::config(format!("Cannot expand '{}': {}", value, e)))
}

/// Build the run configuration: defaults, then profile, then flags.
/// Reads the profile file but writes nothing.
pub fn resolve_config(cli: &Cli) -> Result<DeployConfig> {
    let host = cli
        .host
        .clone()
        .ok_or_else(|| OvaDeployError::config("--host is required"))?;
    let ova = cli
        .ova
        .as_deref()
        .ok_or_else(|| OvaDeployError::config("--ova is required"))?;
    let mut config = DeployConfig::new(host, PathBuf::from(expand(ova)?))?;

    if let Some(profile_path) = &cli.profile {
        let profile = ProfileLoader::new().load_profile(expand(profile_path)?)?;
        config.apply_profile(&profile);
    }

    if let Some(user) = &cli.user {
        config.user = user.clone();
    }
    if let Some(password) = &cli.password {
        config.password = Some(password.clone());
    }
    if let Some(vm_name) = &cli.vm_name {
        config.vm_name = vm_name.clone();
    }
    if let Some(ip) = &cli.ip {
        config.ip = ip.clone();
    }
    if let Some(gw) = &cli.gw {
        config.gateway = gw.clone();
    }
    if let Some(interface) = &cli.interface {
        config.interface = interface.clone();
    }
    if let Some(disk_mode) = cli.disk_mode {
        config.disk_mode = disk_mode.into();
    }
    if cli.overwrite {
        config.overwrite = true;
    }
    if cli.no_power_on {
        config.power_on = false;
    }
    if let Some(workdir) = &cli.workdir {
        config.set_workdir(expand(workdir)?);
    }
    if let Some(output) = &cli.output {
        config.output = PathBuf::from(expand(output)?);
    }
    config.keep_failed = cli.keep_failed;
    config.skip_deploy = cli.skip_deploy;

    if config.host.trim().is_empty() {
        return Err(OvaDeployError::config("--host must not be empty"));
    }
    if config.vm_name.trim().is_empty() {
        return Err(OvaDeployError::config("--vm_name must not be empty"));
    }

    Ok(config)
}

/// Tool locations for `--check-prereqs`, which runs without host or OVA
pub fn resolve_tools(cli: &Cli) -> Result<ToolPaths> {
    let mut tools = ToolPaths::default();
    if let Some(profile_path) = &cli.profile {
        let profile = ProfileLoader::new().load_profile(expand(profile_path)?)?;
        if let Some(overrides) = profile.tools {
            tools.tar = overrides.tar.unwrap_or(tools.tar);
            tools.genisoimage = overrides.genisoimage.unwrap_or(tools.genisoimage);
            tools.ovftool = overrides.ovftool.unwrap_or(tools.ovftool);
        }
    }
    Ok(tools)
}

/// Password to deploy with, prompting without echo when none was supplied
pub async fn obtain_password(config: &DeployConfig) -> Result<Option<String>> {
    if config.skip_deploy {
        return Ok(None);
    }
    if let Some(password) = &config.password {
        return Ok(Some(password.clone()));
    }

    let prompt = format!("Password for {}@{}", config.user, config.host);
    let password = tokio::task::spawn_blocking(move || {
        dialoguer::Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
    })
    .await
    .map_err(|e| OvaDeployError::config(format!("Password prompt failed: {}", e)))?
    .map_err(|e| {
        OvaDeployError::config(format!(
            "No password given and prompting failed ({}); use --password or OVA_DEPLOY_PASSWORD",
            e
        ))
    })?;

    Ok(Some(password))
}

/// Report missing tools; an error when anything is missing
pub fn check_prerequisites_command(tools: &ToolPaths, include_deploy: bool) -> Result<()> {
    let missing = SystemUtils::check_prerequisites(tools, include_deploy);
    if missing.is_empty() {
        println!("{} all required tools found", "ok:".green().bold());
        return Ok(());
    }

    Err(OvaDeployError::ToolNotFound(missing.join(", ")))
}

/// Run the full pipeline against the local system
pub async fn deploy_command(
    config: &DeployConfig,
    password: Option<String>,
) -> Result<PipelineReport> {
    let missing = SystemUtils::check_prerequisites(&config.tools, !config.skip_deploy);
    if !missing.is_empty() {
        return Err(OvaDeployError::ToolNotFound(missing.join(", ")));
    }

    info!(
        "Deploying {} as '{}' to {}@{}",
        config.ova.display(),
        config.vm_name,
        config.user,
        config.host
    );

    let runner = LocalRunner::new();
    let report = Pipeline::new(config, &runner, password).run().await?;
    print_summary(config, &report);
    Ok(report)
}

fn print_summary(config: &DeployConfig, report: &PipelineReport) {
    println!();
    println!("{}", "Deployment summary".bold());
    println!("  {:<10} {}", "OVA:", report.output.display());
    println!("  {:<10} {} ({} bytes)", "Seed ISO:", report.iso, report.iso_size);
    println!("  {:<10} {}", "Members:", report.members.join(", "));
    let gateway = if config.gateway.is_empty() { "-" } else { config.gateway.as_str() };
    println!("  {:<10} {} / gw {}", "Network:", config.ip, gateway);
    if report.deployed {
        println!(
            "  {:<10} {} on {} {}",
            "VM:",
            report.vm_name,
            config.host,
            "deployed".green().bold()
        );
    } else {
        println!("  {:<10} {}", "VM:", "not deployed (--skip-deploy)".yellow());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiskMode;
    use clap::Parser;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["ova-deploy"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_resolve_defaults() {
        let cli = parse(&["--host", "192.168.1.100", "--ova", "myvm.ova", "--password", "pw"]);

        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.vm_name, "myvm");
        assert_eq!(config.user, "root");
        assert_eq!(config.ip, "192.168.1.10/24");
        assert_eq!(config.gateway, "");
        assert_eq!(config.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_resolve_flags_override_profile() {
        // Arrange
        let mut profile = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            profile,
            "user: administrator\nip: 10.9.9.9/8\ngateway: 10.0.0.1\ndisk_mode: thick"
        )
        .unwrap();
        let profile_path = profile.path().to_string_lossy().to_string();
        let cli = parse(&[
            "--host",
            "esx",
            "--ova",
            "foo.bar.ova",
            "--profile",
            &profile_path,
            "--ip",
            "172.20.20.18/24",
            "--workdir",
            "/srv/deploy",
            "--overwrite",
        ]);

        // Act
        let config = resolve_config(&cli).unwrap();

        // Assert
        assert_eq!(config.vm_name, "foo");
        assert_eq!(config.user, "administrator");
        assert_eq!(config.ip, "172.20.20.18/24");
        assert_eq!(config.gateway, "10.0.0.1");
        assert_eq!(config.disk_mode, DiskMode::Thick);
        assert!(config.overwrite);
        assert_eq!(config.output, PathBuf::from("/srv/deploy/image.ova"));
        assert_eq!(config.image_dir(), PathBuf::from("/srv/deploy/image"));
    }

    #[test]
    fn test_resolve_bad_profile_fails() {
        let cli = parse(&["--host", "esx", "--ova", "a.ova", "--profile", "/nonexistent/p.yaml"]);
        assert!(matches!(resolve_config(&cli), Err(OvaDeployError::ConfigError(_))));
    }

    #[test]
    fn test_resolve_tools_from_profile() {
        let mut profile = tempfile::NamedTempFile::new().unwrap();
        writeln!(profile, "tools:\n  ovftool: /opt/vmware/ovftool/ovftool").unwrap();
        let profile_path = profile.path().to_string_lossy().to_string();
        let cli = parse(&["--check-prereqs", "--profile", &profile_path]);

        let tools = resolve_tools(&cli).unwrap();

        assert_eq!(tools.ovftool, "/opt/vmware/ovftool/ovftool");
        assert_eq!(tools.tar, "tar");
    }

    #[tokio::test]
    async fn test_obtain_password_skipped_without_deploy() {
        let cli = parse(&["--host", "esx", "--ova", "a.ova", "--skip-deploy"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(obtain_password(&config).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_obtain_password_uses_supplied_value() {
        let cli = parse(&["--host", "esx", "--ova", "a.ova", "--password", "s3cret"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(obtain_password(&config).await.unwrap().as_deref(), Some("s3cret"));
    }
}
