//! Two-step credential exchange for Harmony hubs.
//!
//! [`Exchanger::login`] trades an account email and password for an
//! identity token at the cloud identity service, and
//! [`Exchanger::swap_auth_token`] trades that token for a session token
//! scoped to one hub. Nothing is cached; every run performs both steps.

pub mod exchanger;
mod identity;
mod pairing;
pub mod types;

pub use exchanger::{Exchanger, ExchangerConfig};
pub use types::{Credential, IdentityToken, SessionToken};

/// Errors from the credential exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("hub unreachable: {0}")]
    HubUnreachable(String),
}
