//! Hub pairing exchange (step two).
//!
//! Opens a short-lived WebSocket to the hub, presents the identity token
//! and waits for the reply carrying the session identity. The socket is
//! closed as soon as the reply arrives.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use harmony_protocol::envelope::{Message, ResponseStatus};
use harmony_protocol::messages::{PairRequest, PairResponse};
use harmony_protocol::{HubAddress, MessageType};

use crate::AuthError;
use crate::types::{IdentityToken, SessionToken};

type HubStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Swaps `identity` for a session token scoped to `hub`.
pub(crate) async fn pair(
    hub: &HubAddress,
    identity: &IdentityToken,
    client_name: &str,
    timeout: Duration,
) -> Result<SessionToken, AuthError> {
    let url = hub.ws_url();
    debug!(%url, "pairing with hub");

    let (mut ws, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(&url))
        .await
        .map_err(|_| AuthError::HubUnreachable(format!("{hub}: connect timed out")))?
        .map_err(|e| AuthError::HubUnreachable(format!("{hub}: {e}")))?;

    let id = uuid::Uuid::new_v4().to_string();
    let request = PairRequest {
        token: identity.as_str().to_string(),
        name: client_name.to_string(),
    };
    let json = Message::request(&id, MessageType::Pair, Some(&request))
        .and_then(|m| serde_json::to_string(&m))
        .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;

    ws.send(tungstenite::Message::Text(json.into()))
        .await
        .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;

    let reply = tokio::time::timeout(timeout, read_reply(&mut ws, &id))
        .await
        .map_err(|_| AuthError::NetworkFailure("no pairing reply from hub".into()))?;

    // The pairing socket is single-use; a failed close changes nothing.
    let _ = ws.close(None).await;

    session_token_from(reply?)
}

/// Reads frames until the reply with the given id arrives.
async fn read_reply(ws: &mut HubStream, id: &str) -> Result<Message, AuthError> {
    while let Some(frame) = ws.next().await {
        match frame.map_err(|e| AuthError::NetworkFailure(e.to_string()))? {
            tungstenite::Message::Text(text) => {
                let msg: Message = serde_json::from_str(&text)
                    .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;
                if msg.id == id {
                    return Ok(msg);
                }
                trace!(cmd = ?msg.cmd, "ignoring unrelated frame while pairing");
            }
            tungstenite::Message::Close(_) => {
                return Err(AuthError::NetworkFailure(
                    "hub closed the connection while pairing".into(),
                ));
            }
            _ => {}
        }
    }
    Err(AuthError::NetworkFailure("hub stream ended while pairing".into()))
}

/// Interprets the pairing reply.
fn session_token_from(reply: Message) -> Result<SessionToken, AuthError> {
    match reply.status() {
        ResponseStatus::Ok => {}
        ResponseStatus::Unauthorized => return Err(AuthError::InvalidCredentials),
        ResponseStatus::Rejected { code, message } => {
            return Err(AuthError::UnexpectedResponse(format!(
                "pairing rejected ({code}): {message}"
            )));
        }
    }

    let resp: PairResponse = reply
        .parse_data()
        .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?
        .ok_or_else(|| AuthError::UnexpectedResponse("empty pairing reply".into()))?;

    if resp.status != PairResponse::SUCCEEDED {
        debug!(status = %resp.status, "hub refused pairing");
        return Err(AuthError::InvalidCredentials);
    }

    match resp.identity {
        Some(identity) if !identity.is_empty() => Ok(SessionToken::new(identity)),
        _ => Err(AuthError::UnexpectedResponse(
            "pairing reply without identity".into(),
        )),
    }
}
