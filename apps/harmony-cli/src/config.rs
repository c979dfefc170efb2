//! Optional CLI settings.
//!
//! Settings are read from TOML and never written back:
//! - Linux: `~/.config/harmony/cli.toml`
//! - Windows: `%APPDATA%/harmony/cli.toml`
//!
//! Command-line flags and environment variables take precedence over the
//! file. Credentials are never read from it.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::cli::LogLevel;

/// Contents of the settings file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Hub host, optionally `host:port`.
    pub harmony_ip: Option<String>,
    pub harmony_port: Option<u16>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Bound on connecting and authenticating, in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Override for the identity service login endpoint.
    pub identity_url: Option<String>,
    pub loglevel: Option<LogLevel>,
}

impl Settings {
    /// Loads settings from `explicit`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields empty
    /// settings.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::read(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::read(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing settings in {}", path.display()))
    }
}

/// Returns the platform-specific settings file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("harmony").join("cli.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("harmony")
            .join("cli.toml")
    }
}
