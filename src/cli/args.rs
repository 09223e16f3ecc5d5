// file: src/cli/args.rs
// version: 2.1.0
// guid: 4caa9418-267e-46a8-80ce-90b7ff864441

//! Command line argument definitions

use crate::config::DiskMode;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ova-deploy")]
#[command(about = "Inject a cloud-init seed ISO into an OVA and deploy it with ovftool")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[arg(long, required_unless_present = "check_prereqs", help = "Hypervisor address")]
    pub host: Option<String>,

    #[arg(long, help = "Hypervisor account [default: root]")]
    pub user: Option<String>,

    #[arg(
        long,
        env = "OVA_DEPLOY_PASSWORD",
        hide_env_values = true,
        help = "Hypervisor password; prompted for when absent"
    )]
    pub password: Option<String>,

    #[arg(long, required_unless_present = "check_prereqs", help = "Source OVA")]
    pub ova: Option<String>,

    #[arg(long = "vm_name", help = "VM name [default: OVA file name up to the first dot]")]
    pub vm_name: Option<String>,

    #[arg(long, help = "Guest address in CIDR form [default: 192.168.1.10/24]")]
    pub ip: Option<String>,

    #[arg(long, help = "Guest default gateway [default: none]")]
    pub gw: Option<String>,

    #[arg(long, help = "Replace an existing VM with the same name")]
    pub overwrite: bool,

    #[arg(long, help = "Leave the VM powered off after import")]
    pub no_power_on: bool,

    #[arg(long, value_enum, help = "Disk provisioning mode [default: thin]")]
    pub disk_mode: Option<DiskModeArg>,

    #[arg(long, help = "Interface name for a newly created network template [default: eth0]")]
    pub interface: Option<String>,

    #[arg(long, help = "Directory holding config/, image/ and logs/ [default: .]")]
    pub workdir: Option<String>,

    #[arg(short, long, help = "Repackaged OVA [default: <workdir>/image.ova]")]
    pub output: Option<String>,

    #[arg(long, help = "YAML deployment profile with site defaults")]
    pub profile: Option<String>,

    #[arg(long, help = "Build the OVA but do not deploy it")]
    pub skip_deploy: bool,

    #[arg(long, help = "Keep the workspace when a stage fails")]
    pub keep_failed: bool,

    #[arg(long, help = "Report missing external tools and exit")]
    pub check_prereqs: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Disk mode argument for CLI
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiskModeArg {
    Thin,
    Thick,
    EagerZeroedThick,
}

impl From<DiskModeArg> for DiskMode {
    fn from(mode: DiskModeArg) -> Self {
        match mode {
            DiskModeArg::Thin => DiskMode::Thin,
            DiskModeArg::Thick => DiskMode::Thick,
            DiskModeArg::EagerZeroedThick => DiskMode::EagerZeroedThick,
        }
    }
}
