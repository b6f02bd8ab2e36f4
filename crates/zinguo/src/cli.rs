//! Clap derive structures for the `zinguo` CLI.
//!
//! Only depends on clap and clap_complete so that `build.rs` can include it
//! for man page generation.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// zinguo -- control a Zinguo bath heater through the vendor cloud
#[derive(Debug, Parser)]
#[command(
    name = "zinguo",
    version,
    about = "Control Zinguo bath heaters from the command line",
    long_about = "Reads and controls a Zinguo Wi-Fi bath heater through the vendor cloud.\n\n\
        Every write carries the full switch state, so channels you do not\n\
        mention keep their last known value.",
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
    /// Device profile to use
    #[arg(long, short = 'p', env = "ZINGUO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Cloud account (overrides profile)
    #[arg(long, short = 'a', env = "ZINGUO_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Device MAC address (overrides profile)
    #[arg(long, short = 'm', env = "ZINGUO_MAC", global = true)]
    pub mac: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ZINGUO_OUTPUT",
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

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept invalid TLS certificates (the default for the vendor hosts)
    #[arg(long, short = 'k', env = "ZINGUO_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "ZINGUO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
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
    /// List the devices bound to the account
    #[command(alias = "ls")]
    Devices,

    /// Fetch and show the current device state
    #[command(alias = "st")]
    Status,

    /// Turn one switch on or off
    #[command(alias = "sw")]
    Switch(SwitchArgs),

    /// Select a fan preset
    Fan(FanArgs),

    /// Set an auto-close parameter
    Set(SetArgs),

    /// Schedule the light to switch off at HH:MM
    LightAutoClose(LightAutoCloseArgs),

    /// Turn every channel off
    TurnOffAll,

    /// Poll the device and print every state change until Ctrl-C
    Watch(WatchArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Control arguments ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SwitchName {
    Light,
    Heater1,
    Heater2,
    Wind,
    Ventilation,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    /// Switch to change
    pub switch: SwitchName,

    /// Desired state
    pub state: OnOff,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FanMode {
    /// Heaters and wind off
    Off,
    /// First heater (wind follows)
    Heat1,
    /// Second heater (wind follows)
    Heat2,
    /// Wind only
    Cool,
}

#[derive(Debug, Args)]
pub struct FanArgs {
    pub preset: FanMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ParameterName {
    /// Ventilation auto-close, minutes (0-60)
    VentilationAutoClose,
    /// Warming auto-close, minutes (0-60)
    WarmingAutoClose,
    /// Over-heat cut-off, degrees Celsius (35-60)
    OverHeatAutoClose,
    /// Displayed temperature offset (0-10)
    TemperatureCalibration,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    pub parameter: ParameterName,

    pub value: i64,
}

#[derive(Debug, Args)]
pub struct LightAutoCloseArgs {
    /// Time of day, HH:MM
    pub time: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval in seconds (overrides profile)
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
