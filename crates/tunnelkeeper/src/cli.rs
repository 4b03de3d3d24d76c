//! Clap derive structures for the `tunnelkeeper` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tunnelkeeper -- keep a WireGuard VPN tunnel and its device account in shape
#[derive(Debug, Parser)]
#[command(
    name = "tunnelkeeper",
    version,
    about = "Manage a VPN tunnel and its device account from the command line",
    long_about = "Coordinates the account and device backend, the locally stored \
        settings and the tunnel runner process.\n\n\
        Every command loads the stored configuration first, so commands can be \
        run one at a time from scripts.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "TUNNELKEEPER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TUNNELKEEPER_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, env = "TUNNELKEEPER_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// Create, log in to and inspect the account
    #[command(alias = "acct")]
    Account(AccountArgs),

    /// Inspect this device and rotate its key
    #[command(alias = "dev")]
    Device(DeviceArgs),

    /// Start the tunnel
    #[command(alias = "up")]
    Connect(ConnectArgs),

    /// Stop the tunnel
    #[command(alias = "down")]
    Disconnect,

    /// Ask the running tunnel to reconnect
    Reconnect(ReconnectArgs),

    /// Show the tunnel status
    #[command(alias = "st")]
    Status,

    /// List cached relays
    Relays(RelaysArgs),

    /// Manage relay constraints
    Constraints(ConstraintsArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Account ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AccountArgs {
    #[command(subcommand)]
    pub command: AccountCommand,
}

#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Create a new account and register this device on it
    Create,

    /// Log in to an existing account and register this device on it
    Login {
        /// Account number (prompted for when omitted)
        number: Option<String>,
    },

    /// Unregister this device and forget the account
    Logout,

    /// Show the stored account
    Info,

    /// Refresh the account expiry from the backend
    Refresh,
}

// ── Device ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: DeviceCommand,
}

#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// Show the stored device
    Info,

    /// Refresh the device from the backend
    Refresh,

    /// Replace the device key
    RotateKey {
        /// Only rotate when the key is at least this old (e.g. "14d")
        #[arg(long)]
        interval: Option<String>,
    },
}

// ── Tunnel ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Stay attached and print status changes; Ctrl-C disconnects
    #[arg(long, short = 'f')]
    pub foreground: bool,

    /// Seconds to wait for the tunnel to come up
    #[arg(long, default_value = "30")]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct ReconnectArgs {
    /// Pick a new relay instead of reusing the current one
    #[arg(long)]
    pub new_relay: bool,
}

// ── Relays ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RelaysArgs {
    /// Only show relays in this country (two-letter code)
    #[arg(long, short = 'c')]
    pub country: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConstraintsArgs {
    #[command(subcommand)]
    pub command: ConstraintsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConstraintsCommand {
    /// Show the current relay constraints
    Show,

    /// Replace the relay constraints
    Set {
        /// Country code, e.g. "se"
        #[arg(long)]
        country: String,

        /// City code within the country, e.g. "got"
        #[arg(long)]
        city: Option<String>,

        /// Relay hostname within the city (requires --city)
        #[arg(long, requires = "city")]
        hostname: Option<String>,

        /// WireGuard port
        #[arg(long)]
        port: Option<u16>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Set a configuration value
    Set {
        /// Config key (e.g. "api_url", "runner.command")
        key: String,

        /// Value to set
        value: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
