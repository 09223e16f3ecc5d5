// file: src/main.rs
// version: 2.1.0
// guid: 9b0f3c2e-51d7-4a8e-b6a1-2f4d7c8e9a10

//! ova-deploy - Main entry point

use clap::Parser;
use colored::Colorize;
use ova_deploy::{
    cli::{args::Cli, commands::*},
    config::DeployConfig,
    logging::init_logger,
    OvaDeployError, Result,
};
use tokio::signal;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version print to stdout and succeed
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let result = match prepare(&cli).await {
        // Ctrl-C is intercepted only after the password prompt has returned
        Ok(Some((config, password))) => tokio::select! {
            result = deploy_command(&config, password) => result.map(|_| ()),
            _ = signal::ctrl_c() => Err(OvaDeployError::Interrupted),
        },
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {}
        Err(OvaDeployError::Interrupted) => {
            warn!("Application interrupted by user");
            eprintln!("{} interrupted", "error:".red().bold());
            std::process::exit(130);
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Resolve the configuration and password. `None` when the command is
/// already complete.
async fn prepare(cli: &Cli) -> Result<Option<(DeployConfig, Option<String>)>> {
    if cli.check_prereqs {
        init_logger(cli.verbose, cli.quiet, None)?;
        let tools = resolve_tools(cli)?;
        check_prerequisites_command(&tools, true)?;
        return Ok(None);
    }

    // Nothing touches the filesystem until configuration and password are known
    let config = resolve_config(cli)?;
    let password = obtain_password(&config).await?;
    init_logger(cli.verbose, cli.quiet, Some(&config.log_dir()))?;
    Ok(Some((config, password)))
}
