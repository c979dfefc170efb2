//! Simulated Harmony hub and cloud identity service.
//!
//! Serves the hub WebSocket protocol and the identity login endpoint on
//! loopback ports so the credential exchange and session client can be
//! exercised end to end without hardware. Behaviour is driven by a
//! [`SimConfig`]: the seeded configuration document, the accepted
//! account, and which commands the hub silently ignores.

mod config;
mod identity;
mod server;
mod session;

pub use config::SimConfig;
pub use server::HubSimulator;

/// Errors produced by the simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
