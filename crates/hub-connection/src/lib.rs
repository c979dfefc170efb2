//! Authenticated session client for Harmony hubs.
//!
//! A [`HubClient`] owns one WebSocket [`Transport`] to the hub. Every
//! operation goes through the [`Correlator`], which tags requests with a
//! fresh correlation id and resolves the waiting caller when the reply
//! arrives on the reader task. Frames without an id are hub notifications
//! and are handed to the registered event listener.

pub mod client;
pub mod correlator;
pub mod error;
mod pumps;
pub mod transport;
pub mod types;

pub use client::HubClient;
pub use correlator::{Correlator, EventCallback, Outbound};
pub use error::{ConnectionError, HubError, ProtocolError, TimeoutError};
pub use transport::Transport;
pub use types::{ClientConfig, ConnectionState, HubEvent};

pub use harmony_auth::{AuthError, Credential, Exchanger, ExchangerConfig, SessionToken};
