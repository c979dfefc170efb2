//! Simulator lifecycle and shared state.
//!
//! Binds two loopback listeners (hub WebSocket and identity HTTP) on
//! OS-assigned ports and serves them until [`HubSimulator::shutdown`] or
//! drop.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

use harmony_protocol::{HubAddress, Message, MessageType};

use crate::SimError;
use crate::config::SimConfig;

/// Mutable hub state shared by every session and the identity endpoint.
pub(crate) struct SimState {
    pub(crate) config: SimConfig,
    pub(crate) current_activity: String,
    pub(crate) identity_tokens: HashSet<String>,
    /// Session token → consumed.
    pub(crate) session_tokens: HashMap<String, bool>,
    pub(crate) received: Vec<Message>,
    pub(crate) sessions: HashMap<u64, mpsc::Sender<tungstenite::Message>>,
    next_session: u64,
}

impl SimState {
    pub(crate) fn new(config: SimConfig) -> Self {
        Self {
            current_activity: config.current_activity.clone(),
            config,
            identity_tokens: HashSet::new(),
            session_tokens: HashMap::new(),
            received: Vec::new(),
            sessions: HashMap::new(),
            next_session: 0,
        }
    }

    pub(crate) fn issue_identity_token(&mut self) -> String {
        let token = format!("id-{}", uuid::Uuid::new_v4());
        self.identity_tokens.insert(token.clone());
        token
    }

    pub(crate) fn issue_session_token(&mut self) -> String {
        let token = format!("sess-{}", uuid::Uuid::new_v4());
        self.session_tokens.insert(token.clone(), false);
        token
    }

    pub(crate) fn register_session(&mut self, tx: mpsc::Sender<tungstenite::Message>) -> u64 {
        self.next_session += 1;
        self.sessions.insert(self.next_session, tx);
        self.next_session
    }

    /// Queues a frame on every open session, skipping full or closed ones.
    pub(crate) fn broadcast(&self, msg: &Message) -> usize {
        let Ok(json) = serde_json::to_string(msg) else {
            return 0;
        };
        self.sessions
            .values()
            .filter(|tx| {
                tx.try_send(tungstenite::Message::Text(json.clone().into()))
                    .is_ok()
            })
            .count()
    }
}

/// A running simulated hub.
pub struct HubSimulator {
    state: Arc<Mutex<SimState>>,
    hub_addr: SocketAddr,
    identity_addr: SocketAddr,
    cancel: CancellationToken,
}

impl HubSimulator {
    /// Binds both listeners and starts serving.
    pub async fn start(config: SimConfig) -> Result<Arc<Self>, SimError> {
        let hub_listener = TcpListener::bind("127.0.0.1:0").await?;
        let identity_listener = TcpListener::bind("127.0.0.1:0").await?;
        let hub_addr = hub_listener.local_addr()?;
        let identity_addr = identity_listener.local_addr()?;

        let state = Arc::new(Mutex::new(SimState::new(config)));
        let cancel = CancellationToken::new();

        tokio::spawn(run_hub(hub_listener, state.clone(), cancel.clone()));
        tokio::spawn(crate::identity::serve(
            identity_listener,
            state.clone(),
            cancel.clone(),
        ));

        tracing::info!(hub = %hub_addr, identity = %identity_addr, "hub simulator listening");

        Ok(Arc::new(Self {
            state,
            hub_addr,
            identity_addr,
            cancel,
        }))
    }

    /// Address of the simulated hub endpoint.
    pub fn address(&self) -> HubAddress {
        HubAddress::new(self.hub_addr.ip().to_string(), self.hub_addr.port())
    }

    /// URL of the simulated identity login endpoint.
    pub fn identity_url(&self) -> String {
        format!("http://{}/GetUserAuthToken", self.identity_addr)
    }

    /// Issues an identity token as if the account had logged in.
    pub async fn issue_identity_token(&self) -> String {
        self.state.lock().await.issue_identity_token()
    }

    /// Issues a session token as if pairing had succeeded.
    pub async fn issue_session_token(&self) -> String {
        self.state.lock().await.issue_session_token()
    }

    /// Returns `true` if `token` was issued and not yet used to
    /// authenticate.
    pub async fn is_session_token_fresh(&self, token: &str) -> bool {
        self.state.lock().await.session_tokens.get(token) == Some(&false)
    }

    /// Invalidates a session token so that authenticating with it fails.
    pub async fn expire_session_token(&self, token: &str) {
        self.state.lock().await.session_tokens.remove(token);
    }

    /// Activity the hub is currently running.
    pub async fn current_activity(&self) -> String {
        self.state.lock().await.current_activity.clone()
    }

    /// Every request received so far, in arrival order.
    pub async fn received(&self) -> Vec<Message> {
        self.state.lock().await.received.clone()
    }

    /// Requests of one command type received so far.
    pub async fn received_of(&self, cmd: MessageType) -> Vec<Message> {
        self.state
            .lock()
            .await
            .received
            .iter()
            .filter(|m| m.cmd == cmd)
            .cloned()
            .collect()
    }

    /// Number of currently open sessions.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Pushes an unsolicited frame to every open session.
    pub async fn push(&self, msg: &Message) -> usize {
        self.state.lock().await.broadcast(msg)
    }

    /// Closes every open session from the hub side.
    pub async fn close_sessions(&self) {
        let sessions: Vec<_> = self.state.lock().await.sessions.drain().collect();
        for (_, tx) in sessions {
            let _ = tx.send(tungstenite::Message::Close(None)).await;
        }
    }

    /// Stops both listeners and all sessions.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HubSimulator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_hub(listener: TcpListener, state: Arc<Mutex<SimState>>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, peer_addr)) => {
                    let state = state.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = crate::session::serve(stream, state, cancel).await {
                            tracing::debug!(%peer_addr, "session ended with error: {e}");
                        }
                    });
                }
                Err(e) => tracing::error!("accept error: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_dynamic_ports() {
        let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
        let addr = sim.address();
        assert!(addr.port > 0);
        assert_eq!(addr.host, "127.0.0.1");
        assert!(sim.identity_url().starts_with("http://127.0.0.1:"));
        assert_eq!(sim.session_count().await, 0);
        sim.shutdown();
    }

    #[tokio::test]
    async fn session_tokens_track_freshness() {
        let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
        let token = sim.issue_session_token().await;
        assert!(sim.is_session_token_fresh(&token).await);
        assert!(!sim.is_session_token_fresh("other").await);

        sim.expire_session_token(&token).await;
        assert!(!sim.is_session_token_fresh(&token).await);
        sim.shutdown();
    }
}
