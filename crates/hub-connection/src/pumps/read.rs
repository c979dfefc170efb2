//! WebSocket read pump.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use harmony_protocol::Message;
use harmony_protocol::constants::WS_MAX_MESSAGE_SIZE;

use crate::correlator::Correlator;
use crate::error::ConnectionError;
use crate::types::ConnectionState;

/// Reads frames until the stream ends, errors, goes silent for
/// `pong_wait`, or the token is cancelled.
///
/// Any inbound frame resets the silence deadline. On exit the connection
/// is marked disconnected, every pending request fails with
/// [`ConnectionError::Closed`] and the sibling pumps are cancelled.
pub(crate) async fn read_pump<S>(
    mut read: S,
    correlator: Arc<Correlator>,
    state: Arc<watch::Sender<ConnectionState>>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    pong_wait: Duration,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut deadline => {
                warn!(?pong_wait, "hub silent, closing connection");
                break;
            }

            frame = read.next() => {
                match frame {
                    Some(Ok(frame)) => {
                        deadline.as_mut().reset(tokio::time::Instant::now() + pong_wait);

                        match frame {
                            tungstenite::Message::Text(text) => {
                                handle_text(&text, &correlator);
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => trace!("received pong"),
                            tungstenite::Message::Close(frame) => {
                                debug!(?frame, "hub closed the connection");
                                break;
                            }
                            _ => {}
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    state.send_replace(ConnectionState::Disconnected);
    let failed = correlator.fail_all(ConnectionError::Closed);
    if failed > 0 {
        debug!(failed, "failed pending requests on connection loss");
    }
    cancel.cancel();
}

fn handle_text(text: &str, correlator: &Correlator) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse hub frame: {e}");
            return;
        }
    };

    trace!(cmd = ?msg.cmd, id = %msg.id, "received frame");
    correlator.dispatch(msg);
}
