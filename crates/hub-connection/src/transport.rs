//! One authenticated WebSocket connection to a hub.
//!
//! [`Transport::connect`] opens the stream, spawns the read/write/ping
//! pumps and presents the session token. The returned transport is
//! `Ready`; once it leaves that state it never comes back, and a new
//! connection needs a fresh session token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use harmony_auth::SessionToken;
use harmony_protocol::constants::WS_MAX_MESSAGE_SIZE;
use harmony_protocol::messages::AuthenticateRequest;
use harmony_protocol::{HubAddress, MessageType, ResponseStatus};

use crate::correlator::{Correlator, Outbound};
use crate::error::{ConnectionError, HubError};
use crate::types::{ClientConfig, ConnectionState};

/// How long `disconnect(true)` waits for the close frame to be flushed.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Moves `state` from `from` to `to`; returns `false` if it had already
/// left `from`.
fn advance(
    state: &watch::Sender<ConnectionState>,
    from: ConnectionState,
    to: ConnectionState,
) -> bool {
    state.send_if_modified(|current| {
        if *current == from {
            *current = to;
            true
        } else {
            false
        }
    })
}

/// A live hub connection and the tasks serving it.
pub struct Transport {
    address: HubAddress,
    write_tx: mpsc::Sender<tungstenite::Message>,
    state: Arc<watch::Sender<ConnectionState>>,
    correlator: Arc<Correlator>,
    cancel: CancellationToken,
    closed: AtomicBool,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: JoinHandle<()>,
    pinger: JoinHandle<()>,
}

impl Transport {
    /// Opens and authenticates a connection within `config.connect_timeout`.
    ///
    /// Inbound replies and notifications are routed to `correlator`.
    pub async fn connect(
        address: &HubAddress,
        token: &SessionToken,
        correlator: Arc<Correlator>,
        config: &ClientConfig,
    ) -> Result<Self, ConnectionError> {
        let attempt = Self::establish(address, token, correlator, config);
        match tokio::time::timeout(config.connect_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                warn!(hub = %address, timeout = ?config.connect_timeout, "hub connection timed out");
                Err(ConnectionError::Timeout)
            }
        }
    }

    async fn establish(
        address: &HubAddress,
        token: &SessionToken,
        correlator: Arc<Correlator>,
        config: &ClientConfig,
    ) -> Result<Self, ConnectionError> {
        let url = address.ws_url();
        let state = Arc::new(watch::channel(ConnectionState::Connecting).0);
        debug!(%url, "connecting to hub");

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url.as_str(), Some(ws_config), false)
                .await
                .map_err(|e| ConnectionError::Refused(e.to_string()))?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let cancel = CancellationToken::new();

        let writer = tokio::spawn(crate::pumps::write_pump(write, write_rx, cancel.clone()));
        let reader = tokio::spawn(crate::pumps::read_pump(
            read,
            correlator.clone(),
            state.clone(),
            write_tx.clone(),
            config.pong_wait,
            cancel.clone(),
        ));
        let pinger = tokio::spawn(crate::pumps::ping_pump(
            write_tx.clone(),
            config.ping_period,
            cancel.clone(),
        ));

        advance(&state, ConnectionState::Connecting, ConnectionState::Authenticating);
        let transport = Self {
            address: address.clone(),
            write_tx,
            state,
            correlator,
            cancel,
            closed: AtomicBool::new(false),
            writer: Mutex::new(Some(writer)),
            reader,
            pinger,
        };

        if let Err(e) = transport.authenticate(token, config.request_timeout).await {
            transport.disconnect(false).await;
            return Err(e);
        }

        // The reader may already have seen the hub go away; Disconnected is final.
        let ready = advance(
            &transport.state,
            ConnectionState::Authenticating,
            ConnectionState::Ready,
        );
        if !ready || transport.cancel.is_cancelled() {
            transport.disconnect(false).await;
            return Err(ConnectionError::Refused(
                "hub closed the connection during authentication".into(),
            ));
        }
        info!(hub = %address, "hub session ready");
        Ok(transport)
    }

    async fn authenticate(
        &self,
        token: &SessionToken,
        timeout: Duration,
    ) -> Result<(), ConnectionError> {
        let params = AuthenticateRequest {
            token: token.as_str().to_owned(),
        };
        let reply = self
            .correlator
            .call(&Handshake(self), MessageType::Authenticate, Some(&params), timeout)
            .await;

        match reply {
            Ok(msg) => match msg.status() {
                ResponseStatus::Ok => Ok(()),
                ResponseStatus::Unauthorized => Err(ConnectionError::AuthRejected(
                    msg.msg.unwrap_or_else(|| "unauthorized".into()),
                )),
                ResponseStatus::Rejected { code, message } => {
                    Err(ConnectionError::AuthRejected(format!("{code}: {message}")))
                }
            },
            Err(HubError::Timeout(_)) => Err(ConnectionError::Timeout),
            Err(HubError::Connection(ConnectionError::Closed)) => Err(ConnectionError::Refused(
                "hub closed the connection during authentication".into(),
            )),
            Err(HubError::Connection(e)) => Err(e),
            Err(e) => Err(ConnectionError::Refused(e.to_string())),
        }
    }

    /// Hub this transport is connected to.
    pub fn address(&self) -> &HubAddress {
        &self.address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watches lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Closes the connection and fails every pending request with
    /// [`ConnectionError::Closed`].
    ///
    /// With `send_close` a close frame is flushed first; without it the
    /// socket is simply dropped. Calling this more than once is a no-op.
    pub async fn disconnect(&self, send_close: bool) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.send_replace(ConnectionState::Disconnected);

        if send_close {
            let close = tungstenite::Message::Close(None);
            let queued = tokio::time::timeout(CLOSE_GRACE, self.write_tx.send(close)).await;
            let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let (Ok(Ok(())), Some(writer)) = (queued, writer)
                && tokio::time::timeout(CLOSE_GRACE, writer).await.is_err()
            {
                debug!("close frame not flushed in time");
            }
        }

        self.cancel.cancel();
        let failed = self.correlator.fail_all(ConnectionError::Closed);
        info!(hub = %self.address, failed, "disconnected from hub");
    }

    /// Queues a text frame for the writer.
    async fn push(&self, frame: String) -> Result<(), ConnectionError> {
        if self.cancel.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        self.write_tx
            .send(tungstenite::Message::Text(frame.into()))
            .await
            .map_err(|_| ConnectionError::Closed)
    }
}

impl Outbound for Transport {
    async fn send(&self, frame: String) -> Result<(), ConnectionError> {
        if self.state() != ConnectionState::Ready {
            return Err(ConnectionError::NotReady);
        }
        self.push(frame).await
    }
}

/// Sends during authentication, before the transport is `Ready`.
struct Handshake<'a>(&'a Transport);

impl Outbound for Handshake<'_> {
    async fn send(&self, frame: String) -> Result<(), ConnectionError> {
        self.0.push(frame).await
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.reader.abort();
        self.pinger.abort();
        if let Some(writer) = self.writer.lock().unwrap_or_else(|e| e.into_inner()).take() {
            writer.abort();
        }
    }
}
