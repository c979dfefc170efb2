use serde::{Deserialize, Serialize};

use crate::types::IrAction;

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Swaps an identity token for a hub session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRequest {
    pub token: String,
    /// Client name followed by the device signature.
    pub name: String,
}

/// Authenticates a freshly opened session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    pub token: String,
}

/// Switches the hub to another activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartActivityRequest {
    pub activity_id: String,
    #[serde(default)]
    pub timestamp: u64,
}

impl StartActivityRequest {
    pub fn new(activity_id: impl Into<String>) -> Self {
        Self {
            activity_id: activity_id.into(),
            timestamp: now_millis(),
        }
    }
}

/// Phase of a simulated button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldStatus {
    Press,
    Release,
}

/// Emits a command on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldActionRequest {
    /// JSON-encoded [`IrAction`].
    pub action: String,
    pub status: HoldStatus,
    #[serde(default)]
    pub timestamp: u64,
}

impl HoldActionRequest {
    pub fn new(action: &IrAction, status: HoldStatus) -> Result<Self, serde_json::Error> {
        Ok(Self {
            action: serde_json::to_string(action)?,
            status,
            timestamp: now_millis(),
        })
    }

    /// Decodes the nested action body.
    pub fn parse_action(&self) -> Result<IrAction, serde_json::Error> {
        serde_json::from_str(&self.action)
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Result of a pairing exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResponse {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub status: String,
}

impl PairResponse {
    pub const SUCCEEDED: &'static str = "succeeded";
}

/// Current activity of the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentActivityResponse {
    pub result: String,
}

// ---------------------------------------------------------------------------
// Events (hub → client, no correlation id)
// ---------------------------------------------------------------------------

/// Activity transition pushed by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDigest {
    pub activity_id: String,
    /// 0 = off, 1 = starting, 2 = started, 3 = stopping.
    #[serde(default)]
    pub activity_status: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_action_nests_action_as_string() {
        let req =
            HoldActionRequest::new(&IrAction::ir_command("42", "VolumeUp"), HoldStatus::Press).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert!(json["action"].is_string());
        assert_eq!(json["status"], "press");
        assert_eq!(req.parse_action().unwrap().device_id, "42");
    }

    #[test]
    fn start_activity_uses_camel_case() {
        let json = serde_json::to_value(StartActivityRequest::new("1")).unwrap();
        assert_eq!(json["activityId"], "1");
        assert!(json["timestamp"].as_u64().unwrap() > 0);
    }

    #[test]
    fn pair_response_without_identity() {
        let resp: PairResponse = serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert!(resp.identity.is_none());
        assert_ne!(resp.status, PairResponse::SUCCEEDED);
    }

    #[test]
    fn state_digest_status_defaults() {
        let digest: StateDigest = serde_json::from_str(r#"{"activityId":"5"}"#).unwrap();
        assert_eq!(digest.activity_id, "5");
        assert_eq!(digest.activity_status, 0);
    }
}
