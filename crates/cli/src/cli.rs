//! Command line definition.

use clap::{Args, Parser, Subcommand};
use lk_core::telemetry::{LogFormat, DEFAULT_FILTER};
use lk_protocol::build_models::BuildPhase;
use lk_protocol::config_models::Mode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lk")]
#[command(author, version, about = "Supervise and build a desktop application's processes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root containing `.lifecycle/`
    #[arg(short = 'C', long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Log filter, e.g. `info` or `lk_core=debug,lk::output=warn`
    #[arg(long, global = true, env = "LK_LOG", default_value = DEFAULT_FILTER)]
    pub log: String,

    /// Log line format: compact or json
    #[arg(long, global = true, env = "LK_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start every role in order and supervise until shutdown
    Up(UpArgs),

    /// Run the build pipeline
    Build(BuildArgs),

    /// Validate and print the resolved configuration
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct UpArgs {
    /// Which roles to run
    #[arg(long, env = "LK_MODE", default_value_t = Mode::Production)]
    pub mode: Mode,

    /// Continue without optional roles that fail, without asking
    #[arg(long)]
    pub accept_degraded: bool,

    /// Preferred port for roles whose port reads `LK_DEV_PORT`
    #[arg(long, env = "LK_DEV_PORT")]
    pub dev_port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Only remove the clean directories
    #[arg(long, conflicts_with_all = ["validate", "phase", "group", "step"])]
    pub clean: bool,

    /// Only check that the declared artifacts exist
    #[arg(long, conflicts_with_all = ["phase", "group", "step"])]
    pub validate: bool,

    /// Only run steps of this phase (install, compile, package)
    #[arg(long, conflicts_with_all = ["group", "step"])]
    pub phase: Option<BuildPhase>,

    /// Only run steps of this group, e.g. `backend`
    #[arg(long, conflicts_with = "step")]
    pub group: Option<String>,

    /// Only run the named step; repeatable
    #[arg(long = "step", value_name = "NAME")]
    pub step: Vec<String>,

    /// Print the summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Print the configuration as JSON on stdout
    #[arg(long)]
    pub json: bool,
}
