//! Clap derive structures for the `byme` CLI.

use std::path::PathBuf;

use byme_core::Platform;
use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// byme -- inspect and drive a Vimar By-me installation
#[derive(Debug, Parser)]
#[command(
    name = "byme",
    version,
    about = "Control Vimar By-me home automation from the command line",
    long_about = "Talks to the By-me web server over its SOAP interface:\n\
        lists and classifies devices, reads and writes their attributes,\n\
        and follows the device table as it is polled.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "BYME_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Web server profile to use
    #[arg(long, short = 'p', env = "BYME_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List classified devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show every attribute of one device, read fresh from the web server
    Status(StatusArgs),

    /// Write one device attribute
    Set(SetArgs),

    /// Download the web server's root CA to the profile's certificate path
    InstallCert,

    /// Poll the web server and print each update cycle
    Watch(WatchArgs),
}

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Only show devices of this platform (light, cover, climate, ...)
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Re-read each listed device individually before printing
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Object id of the device
    pub object_id: String,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Object id of the device
    pub object_id: String,

    /// Attribute name, e.g. on/off or setpoint
    pub status_name: String,

    /// New raw value
    pub value: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many poll cycles (runs until Ctrl-C otherwise)
    #[arg(long)]
    pub cycles: Option<u32>,
}
