use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_HUB_PORT;

/// Network location of a hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HubAddress {
    pub host: String,
    pub port: u16,
}

/// Errors from parsing a [`HubAddress`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty hub address")]
    Empty,

    #[error("invalid port: {0}")]
    InvalidPort(String),
}

impl HubAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// WebSocket URL of the hub endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{self}/")
    }
}

impl fmt::Display for HubAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for HubAddress {
    type Err = AddressError;

    /// Parses `host`, `host:port` or `[v6]:port`. The port defaults to
    /// [`DEFAULT_HUB_PORT`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| AddressError::InvalidPort(s.to_string()))?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().map_err(|_| AddressError::InvalidPort(p.to_string()))?,
                None => DEFAULT_HUB_PORT,
            };
            return Ok(Self::new(host, port));
        }

        match s.rsplit_once(':') {
            // More than one colon without brackets: bare IPv6 literal.
            Some((host, _)) if host.contains(':') => Ok(Self::new(s, DEFAULT_HUB_PORT)),
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(AddressError::Empty);
                }
                let port = port
                    .parse()
                    .map_err(|_| AddressError::InvalidPort(port.to_string()))?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(s, DEFAULT_HUB_PORT)),
        }
    }
}

/// Full hub configuration document.
///
/// Unknown fields are kept in `extra` so the document can be printed back
/// in full.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "activity", default)]
    pub activities: Vec<Activity>,
    #[serde(rename = "device", default)]
    pub devices: Vec<Device>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Configuration {
    /// Looks up an activity by exact id.
    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// Looks up a device by exact id.
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }
}

/// A named operating mode of the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Activity {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A device controlled by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub label: String,
    #[serde(rename = "controlGroup", default, skip_serializing_if = "Vec::is_empty")]
    pub control_groups: Vec<ControlGroup>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Device {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            control_groups: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Names of every command the device supports, across all groups.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.control_groups
            .iter()
            .flat_map(|g| g.functions.iter())
            .map(|f| f.name.as_str())
    }

    /// Returns `true` if the device exposes the named command.
    pub fn supports(&self, command: &str) -> bool {
        self.commands().any(|c| c == command)
    }
}

/// A group of related commands (e.g. "Power", "Volume").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlGroup {
    pub name: String,
    #[serde(rename = "function", default)]
    pub functions: Vec<Function>,
}

/// A single command a device supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// JSON-encoded [`IrAction`] the hub expects in a `holdAction`.
    #[serde(default)]
    pub action: String,
}

/// The action body of a `holdAction` request.
///
/// On the wire this is itself a JSON string nested in the request params.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrAction {
    pub command: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub device_id: String,
}

impl IrAction {
    pub fn ir_command(device_id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            action_type: "IRCommand".into(),
            device_id: device_id.into(),
        }
    }
}
