//! Public types for the hub session client.

use std::time::Duration;

use harmony_protocol::constants::{
    CONNECT_TIMEOUT, REQUEST_TIMEOUT, WS_PING_PERIOD, WS_PONG_WAIT,
};
use harmony_protocol::messages::StateDigest;
use harmony_protocol::{Message, MessageType};

/// Lifecycle of a hub connection.
///
/// `Disconnected → Connecting → Authenticating → Ready → Disconnected`.
/// Any state may drop to `Disconnected`; a disconnected transport is never
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// WebSocket handshake in progress.
    Connecting,
    /// Stream open, session token presented, waiting for the hub.
    Authenticating,
    /// Authenticated; requests may be issued.
    Ready,
}

/// Unsolicited message pushed by the hub.
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// The hub switched (or is switching) activities.
    ActivityChanged { activity_id: String, status: i32 },
    /// Any other notification, passed through untouched.
    Notification(Message),
}

impl HubEvent {
    /// Classifies an uncorrelated frame.
    pub fn from_message(msg: Message) -> Self {
        if msg.cmd == MessageType::StateDigestNotify
            && let Ok(Some(digest)) = msg.parse_data::<StateDigest>()
        {
            return HubEvent::ActivityChanged {
                activity_id: digest.activity_id,
                status: digest.activity_status,
            };
        }
        HubEvent::Notification(msg)
    }
}

/// Timeouts and keep-alive settings for a session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on each request/response call.
    pub request_timeout: Duration,
    /// Bound on opening the stream plus the authentication handshake.
    pub connect_timeout: Duration,
    /// Interval between keep-alive pings.
    pub ping_period: Duration,
    /// Silence after which the connection is considered dead.
    pub pong_wait: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            ping_period: WS_PING_PERIOD,
            pong_wait: WS_PONG_WAIT,
        }
    }
}

impl ClientConfig {
    /// Returns a copy with a different request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
