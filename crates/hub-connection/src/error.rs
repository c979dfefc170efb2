//! Error taxonomy for the session client.

use std::time::Duration;

use harmony_auth::AuthError;

/// Errors from the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("session token rejected: {0}")]
    AuthRejected(String),

    #[error("timed out connecting to hub")]
    Timeout,

    #[error("connection not ready")]
    NotReady,

    #[error("connection closed")]
    Closed,
}

/// Errors in the content of a hub reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("hub rejected request ({code}): {message}")]
    Rejected { code: u16, message: String },

    #[error("failed to encode request: {0}")]
    Encode(String),
}

/// A request received no reply within its timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// Any failure surfaced by [`HubClient`](crate::HubClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(ConnectionError::Closed.to_string(), "connection closed");
        assert_eq!(ConnectionError::NotReady.to_string(), "connection not ready");

        let err = ProtocolError::Rejected {
            code: 404,
            message: "unknown activity".into(),
        };
        assert!(err.to_string().contains("404"));

        let err = TimeoutError(Duration::from_millis(250));
        assert_eq!(err.to_string(), "request timed out after 250ms");
    }

    #[test]
    fn hub_error_is_transparent() {
        let err: HubError = ConnectionError::AuthRejected("expired".into()).into();
        assert_eq!(err.to_string(), "session token rejected: expired");

        let err: HubError = AuthError::InvalidCredentials.into();
        assert!(matches!(err, HubError::Auth(AuthError::InvalidCredentials)));
    }
}
