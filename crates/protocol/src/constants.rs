use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port the hub listens on unless told otherwise.
pub const DEFAULT_HUB_PORT: u16 = 5222;

/// Time to wait for any incoming frame (pong, response or notification).
///
/// Acts as a read deadline: if *nothing* arrives within this window the
/// connection is considered dead.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(30);

/// How often to send pings (must be well below [`WS_PONG_WAIT`]).
pub const WS_PING_PERIOD: Duration = Duration::from_secs(5);

/// Maximum message size in bytes (16 MB). Hub configurations with many
/// devices run to a few hundred kilobytes.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Timeout for request/response operations.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for opening the stream and completing the authentication
/// handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Activity id the hub uses for "everything off".
pub const POWER_OFF_ACTIVITY_ID: &str = "-1";

/// Device signature sent with the pairing request. The hub only accepts
/// pairing from clients that identify as one of its mobile apps.
pub const PAIR_DEVICE_SUFFIX: &str = "#iOS6.0.1#iPhone";

/// Hub command identifier carried in the `cmd` field of every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Authentication
    #[serde(rename = "vnd.logitech.connect/vnd.logitech.pair")]
    Pair,
    #[serde(rename = "connect.authenticate")]
    Authenticate,

    // Engine requests
    #[serde(rename = "vnd.logitech.harmony/vnd.logitech.harmony.engine?config")]
    GetConfig,
    #[serde(rename = "vnd.logitech.harmony/vnd.logitech.harmony.engine?getCurrentActivity")]
    GetCurrentActivity,
    #[serde(rename = "vnd.logitech.harmony/vnd.logitech.harmony.engine?startactivity")]
    StartActivity,
    #[serde(rename = "vnd.logitech.harmony/vnd.logitech.harmony.engine?holdAction")]
    HoldAction,
    #[serde(rename = "setup.sync")]
    Sync,

    // Events from the hub (push notifications)
    #[serde(rename = "connect.stateDigest?notify")]
    StateDigestNotify,

    /// Any command this client does not know about.
    #[serde(other)]
    Unknown,
}
