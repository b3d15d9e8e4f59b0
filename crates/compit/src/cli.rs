//! Clap derive structures for the `compit` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};

use compit_core::{Platform, SyncMode};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// compit -- inspect and control Compit heating controllers
#[derive(Debug, Parser)]
#[command(
    name = "compit",
    version,
    about = "Inspect and control Compit heating controllers from the command line",
    long_about = "Talks to the Compit iNext cloud with the same account as the mobile app.\n\n\
        Devices are described by a definition catalog and exposed as sensors,\n\
        numbers, selects, switches and climate entities.",
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
    /// Account profile to use
    #[arg(long, short = 'p', env = "COMPIT_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Account e-mail (overrides profile)
    #[arg(long, short = 'e', env = "COMPIT_EMAIL", global = true)]
    pub email: Option<String>,

    /// How to keep device state current
    #[arg(long, short = 'm', env = "COMPIT_MODE", global = true)]
    pub mode: Option<ModeArg>,

    /// Definition catalog language (falls back to English)
    #[arg(long, short = 'l', env = "COMPIT_LANGUAGE", global = true)]
    pub language: Option<String>,

    /// REST API base URL
    #[arg(long, env = "COMPIT_API_URL", global = true, hide = true)]
    pub api_url: Option<String>,

    /// WebSocket URL for push mode
    #[arg(long, env = "COMPIT_WS_URL", global = true, hide = true)]
    pub ws_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "COMPIT_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, env = "COMPIT_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Value enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one identifier per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Periodic REST refresh
    Polling,
    /// WebSocket push updates
    Push,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Polling => SyncMode::Polling,
            ModeArg::Push => SyncMode::Push,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Sensor,
    Number,
    Select,
    Switch,
    Climate,
}

impl From<PlatformArg> for Platform {
    fn from(platform: PlatformArg) -> Self {
        match platform {
            PlatformArg::Sensor => Platform::Sensor,
            PlatformArg::Number => Platform::Number,
            PlatformArg::Select => Platform::Select,
            PlatformArg::Switch => Platform::Switch,
            PlatformArg::Climate => Platform::Climate,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List gates and the devices behind them
    #[command(alias = "g")]
    Gates,

    /// List entities exposed for every device
    #[command(alias = "e")]
    Entities(EntitiesArgs),

    /// Write a parameter value
    Set(SetArgs),

    /// Follow live changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage configuration files and profiles
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    /// Only entities of this device
    #[arg(long, short = 'd')]
    pub device: Option<u64>,

    /// Only entities on this platform
    #[arg(long)]
    pub platform: Option<PlatformArg>,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Device id
    pub device: u64,

    /// Parameter code, e.g. __tpokzadana
    pub code: String,

    /// New value: a number, true/false, or an option description
    pub value: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only changes of this device
    #[arg(long, short = 'd')]
    pub device: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the configuration with secrets masked
    Show,

    /// Create or update a profile for the account given with --email
    Init(ConfigInitArgs),
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub name: String,

    /// Environment variable holding the password
    #[arg(long)]
    pub password_env: Option<String>,

    /// Make this the default profile
    #[arg(long)]
    pub set_default: bool,
}
