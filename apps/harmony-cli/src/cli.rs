//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

/// Control a Harmony hub from the command line.
#[derive(Parser, Debug)]
#[command(name = "harmony", author, version, about, long_about = None)]
pub struct Cli {
    /// Account email used to log in to the identity service.
    #[arg(long, env = "HARMONY_EMAIL")]
    pub email: String,

    /// Account password.
    #[arg(long, env = "HARMONY_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Hub address, optionally with a port (`host:port`).
    #[arg(long = "harmony-ip", value_name = "HOST")]
    pub harmony_ip: Option<String>,

    /// Hub port [default: 5222].
    #[arg(long = "harmony-port", value_name = "PORT")]
    pub harmony_port: Option<u16>,

    /// Console log level; `RUST_LOG` takes precedence [default: info].
    #[arg(long, value_enum, ignore_case = true)]
    pub loglevel: Option<LogLevel>,

    /// Per-request timeout in seconds [default: 30].
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Settings file to read instead of the default location.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the hub configuration.
    ShowConfig,
    /// Print the configuration block of the running activity.
    ShowCurrentActivity,
    /// Switch to a different activity, by label or id.
    StartActivity {
        /// Case-insensitive fragment of the activity label or id.
        activity: String,
    },
    /// Send a single IR command to a device.
    SendCommand {
        #[arg(long = "device-id")]
        device_id: String,
        #[arg(long)]
        command: String,
    },
    /// Sync the hub with the cloud.
    Sync,
    /// Stop the running activity.
    PowerOff,
    /// Start an interactive session.
    Repl,
}

#[derive(ValueEnum, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
