use std::collections::HashSet;

use harmony_protocol::messages::StateDigest;
use harmony_protocol::types::{ControlGroup, Function, IrAction};
use harmony_protocol::{Activity, Configuration, Device, MessageType};

/// Behaviour of a simulated hub.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Document served for `config` requests.
    pub configuration: Configuration,
    /// Activity reported before any `startactivity`.
    pub current_activity: String,
    /// Account accepted by the identity endpoint.
    pub email: String,
    pub password: String,
    /// Commands the hub receives but never answers.
    pub unanswered: HashSet<MessageType>,
    /// Push a state digest to every session after an activity switch.
    pub notify_activity_changes: bool,
}

impl SimConfig {
    pub const DEFAULT_EMAIL: &'static str = "user@example.com";
    pub const DEFAULT_PASSWORD: &'static str = "pw";

    /// Marks a command as never answered.
    pub fn unanswered(mut self, cmd: MessageType) -> Self {
        self.unanswered.insert(cmd);
        self
    }

    pub(crate) fn state_digest(&self, activity_id: &str) -> StateDigest {
        StateDigest {
            activity_id: activity_id.to_string(),
            activity_status: if activity_id == harmony_protocol::constants::POWER_OFF_ACTIVITY_ID {
                0
            } else {
                2
            },
        }
    }
}

fn function(device_id: &str, name: &str, label: &str) -> Function {
    let action = serde_json::to_string(&IrAction::ir_command(device_id, name)).unwrap_or_default();
    Function {
        name: name.to_string(),
        label: label.to_string(),
        action,
    }
}

/// Living-room fixture: PowerOff, "Watch TV" (id 1) and "Listen to Music"
/// (id 2), with a TV and an amplifier.
fn living_room() -> Configuration {
    let mut tv = Device::new("100", "Living Room TV");
    tv.control_groups = vec![
        ControlGroup {
            name: "Power".into(),
            functions: vec![
                function("100", "PowerOn", "Power On"),
                function("100", "PowerOff", "Power Off"),
            ],
        },
        ControlGroup {
            name: "Channel".into(),
            functions: vec![
                function("100", "ChannelUp", "Channel Up"),
                function("100", "ChannelDown", "Channel Down"),
            ],
        },
    ];

    let mut amp = Device::new("200", "Amplifier");
    amp.control_groups = vec![ControlGroup {
        name: "Volume".into(),
        functions: vec![
            function("200", "VolumeUp", "Volume Up"),
            function("200", "VolumeDown", "Volume Down"),
            function("200", "Mute", "Mute"),
        ],
    }];

    Configuration {
        activities: vec![
            Activity::new("-1", "PowerOff"),
            Activity::new("1", "Watch TV"),
            Activity::new("2", "Listen to Music"),
        ],
        devices: vec![tv, amp],
        extra: serde_json::Map::new(),
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            configuration: living_room(),
            current_activity: "-1".into(),
            email: Self::DEFAULT_EMAIL.into(),
            password: Self::DEFAULT_PASSWORD.into(),
            unanswered: HashSet::new(),
            notify_activity_changes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fixture_has_watch_tv() {
        let config = SimConfig::default();
        let activity = config.configuration.activity("1").unwrap();
        assert_eq!(activity.label, "Watch TV");
        assert!(config.configuration.device("200").unwrap().supports("Mute"));
        assert_eq!(config.current_activity, "-1");
    }

    #[test]
    fn unanswered_builder() {
        let config = SimConfig::default().unanswered(MessageType::GetCurrentActivity);
        assert!(config.unanswered.contains(&MessageType::GetCurrentActivity));
        assert!(!config.unanswered.contains(&MessageType::GetConfig));
    }

    #[test]
    fn power_off_digest_status() {
        let config = SimConfig::default();
        assert_eq!(config.state_digest("-1").activity_status, 0);
        assert_eq!(config.state_digest("1").activity_status, 2);
    }
}
