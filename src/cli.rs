//! CLI - Command Line Interface for openwebif
//!
//! Every client operation is scriptable. All output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # What is the box doing?
//! openwebif --host vusolo2 status
//!
//! # Switch channel and turn it up
//! openwebif zap "BBC One HD"
//! openwebif volume 40
//!
//! # Power management
//! openwebif power off
//! openwebif wake
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::api::OpenWebIfError;
use crate::models::{MessageType, PowerState};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Receiver unreachable or answered with an error status
    NetworkError = 3,
    /// Missing or invalid configuration
    ConfigError = 4,
    /// Receiver rejected the command
    CommandFailed = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

impl From<&OpenWebIfError> for ExitCode {
    fn from(err: &OpenWebIfError) -> ExitCode {
        match err {
            OpenWebIfError::Configuration(_) => ExitCode::ConfigError,
            OpenWebIfError::DeviceUnreachable { .. } => ExitCode::NetworkError,
            OpenWebIfError::Communication { .. } => ExitCode::NetworkError,
            OpenWebIfError::Validation(_) => ExitCode::InvalidArgs,
            OpenWebIfError::WakeOnLan(_) => ExitCode::Error,
        }
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// openwebif - control an Enigma2 receiver running OpenWebIf
#[derive(Parser, Debug)]
#[command(
    name = "openwebif",
    version,
    about = "Control an Enigma2 receiver running OpenWebIf",
    long_about = "Query and control an Enigma2 set-top box through its OpenWebIf \
                  HTTP API.\n\n\
                  Connection settings are read from ~/.config/openwebif/config.toml, \
                  then OPENWEBIF_* environment variables, then the flags below.",
    after_help = "EXAMPLES:\n\
                  openwebif --host vusolo2 status     Show what is playing\n\
                  openwebif zap \"RTE One\"             Switch channel\n\
                  openwebif power deep-standby        Power down\n\
                  openwebif picon --json              Logo of the current channel"
)]
pub struct Cli {
    /// Receiver IP or hostname
    #[arg(long = "host", short = 'H', global = true)]
    pub host: Option<String>,

    /// OpenWebIf port
    #[arg(long, short = 'p', global = true)]
    pub port: Option<u16>,

    /// Use HTTPS
    #[arg(long, global = true)]
    pub https: bool,

    /// OpenWebIf username
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// OpenWebIf password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show standby state, channel, programme and volume
    #[command(visible_alias = "st")]
    Status,

    /// Show receiver model and OpenWebIf version
    About,

    /// List bouquets
    Bouquets,

    /// List the channels of a bouquet
    #[command(visible_alias = "src")]
    Sources(SourcesCmd),

    /// Switch to a channel by name or service reference
    Zap(ZapCmd),

    /// Set volume level
    #[command(visible_alias = "vol")]
    Volume(VolumeCmd),

    /// Toggle mute
    Mute,

    /// Next channel
    Up,

    /// Previous channel
    Down,

    /// Toggle play/pause
    PlayPause,

    /// Stop playback
    Stop,

    /// Change power state
    Power(PowerCmd),

    /// Send a Wake-on-LAN packet
    Wake,

    /// Show a message on the TV screen
    #[command(visible_alias = "msg")]
    Message(MessageCmd),

    /// Print the picon (or screen grab) URL of the current channel
    Picon,
}

/// List the channels of a bouquet
#[derive(Args, Debug)]
pub struct SourcesCmd {
    /// Bouquet reference (defaults to the configured or first bouquet)
    #[arg(long, short = 'b')]
    pub bouquet: Option<String>,
}

/// Switch channel
#[derive(Args, Debug)]
pub struct ZapCmd {
    /// Channel name from the source list, or a service reference
    #[arg(required = true)]
    pub target: String,
}

impl ZapCmd {
    /// Service references are colon separated, e.g. 1:0:19:2887:40F:1:C00000:0:0:0:
    pub fn is_service_ref(&self) -> bool {
        self.target.matches(':').count() >= 3
    }
}

/// Set volume level
#[derive(Args, Debug)]
pub struct VolumeCmd {
    /// Volume level (0-100)
    #[arg(required = true, allow_negative_numbers = true)]
    pub level: i32,
}

/// Change power state
#[derive(Args, Debug)]
pub struct PowerCmd {
    #[arg(value_enum)]
    pub action: PowerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerAction {
    /// Wake from standby (sends Wake-on-LAN first if unreachable)
    On,
    /// Standby, or deep standby if configured
    Off,
    Standby,
    DeepStandby,
    Toggle,
    Reboot,
    Restart,
}

impl PowerAction {
    /// Fixed power state for this action; `None` for actions that depend on config
    pub fn power_state(self) -> Option<PowerState> {
        match self {
            PowerAction::On | PowerAction::Off => None,
            PowerAction::Standby => Some(PowerState::Standby),
            PowerAction::DeepStandby => Some(PowerState::DeepStandby),
            PowerAction::Toggle => Some(PowerState::ToggleStandby),
            PowerAction::Reboot => Some(PowerState::Reboot),
            PowerAction::Restart => Some(PowerState::RestartEnigma),
        }
    }
}

/// Show a message on screen
#[derive(Args, Debug)]
pub struct MessageCmd {
    /// Message text
    #[arg(required = true)]
    pub text: String,

    /// Message severity
    #[arg(long = "type", short = 't', value_enum, default_value = "info")]
    pub level: MessageLevel,

    /// Close the message after this many seconds
    #[arg(long)]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageLevel {
    YesNo,
    Info,
    Warning,
    Error,
}

impl From<MessageLevel> for MessageType {
    fn from(level: MessageLevel) -> MessageType {
        match level {
            MessageLevel::YesNo => MessageType::YesNo,
            MessageLevel::Info => MessageType::Info,
            MessageLevel::Warning => MessageType::Warning,
            MessageLevel::Error => MessageType::Error,
        }
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Result of a fire-and-forget command
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub accepted: bool,
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.accepted { "ok" } else { "rejected" };
        write!(f, "{}: {}", self.command, verdict)
    }
}

/// Output handler
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data as JSON
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print success data, human readable outside JSON mode
    pub fn print_display<T: Serialize + fmt::Display>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            return self.print(data);
        }
        println!("{}", data);
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
