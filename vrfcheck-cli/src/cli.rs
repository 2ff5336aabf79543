//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use vrfcheck_core::types::IpFamily;

/// vrfcheck -- VRF isolation conformance checker.
///
/// Use `vrfcheck <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "vrfcheck", version, about, long_about = None)]
pub struct Cli {
    /// Path to the vrfcheck.toml configuration file.
    #[arg(short, long, default_value = "vrfcheck.toml", global = true)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the VRF isolation scenario against the cluster.
    Run(RunArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// IP stack selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IpStack {
    Ipv4,
    Ipv6,
}

impl From<IpStack> for IpFamily {
    fn from(stack: IpStack) -> Self {
        match stack {
            IpStack::Ipv4 => IpFamily::Ipv4,
            IpStack::Ipv6 => IpFamily::Ipv6,
        }
    }
}

/// Run one scenario per requested IP stack.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// IP stack to verify (repeatable).
    #[arg(long = "ip-stack", value_name = "STACK", default_value = "ipv4")]
    pub ip_stacks: Vec<IpStack>,

    /// Pin workloads to this node instead of picking a worker.
    #[arg(long)]
    pub node: Option<String>,

    /// Namespace for attachments and workloads.
    #[arg(long)]
    pub namespace: Option<String>,

    /// Kubeconfig file (default: KUBECONFIG or in-cluster).
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Leave scenario workloads in place after each run.
    #[arg(long)]
    pub keep_workloads: bool,
}

impl RunArgs {
    /// Requested families in command-line order.
    pub fn families(&self) -> Vec<IpFamily> {
        self.ip_stacks.iter().map(|s| IpFamily::from(*s)).collect()
    }
}

// ---- config ----

/// Manage vrfcheck configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, cluster, scenario, timing).
        #[arg(long)]
        section: Option<String>,
    },
}
