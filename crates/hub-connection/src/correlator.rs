//! Request/response correlation.
//!
//! Each call registers a pending request under a fresh UUID, sends the
//! tagged frame and waits on a oneshot slot. The reader task resolves the
//! slot through [`Correlator::dispatch`]. An entry is removed exactly once:
//! by its reply, by [`Correlator::fail_all`], or by the call itself when
//! it times out or is dropped. A reply that finds no entry is discarded.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use harmony_protocol::{Message, MessageType};

use crate::error::{ConnectionError, HubError, ProtocolError, TimeoutError};
use crate::types::HubEvent;

/// Callback type for unsolicited hub messages.
pub type EventCallback = Box<dyn Fn(HubEvent) + Send + Sync>;

type Slot = oneshot::Sender<Result<Message, ConnectionError>>;

type Listener = Arc<dyn Fn(HubEvent) + Send + Sync>;

/// An outstanding request awaiting its reply.
struct PendingRequest {
    issued_at: Instant,
    slot: Slot,
}

/// Anything that can put an encoded frame on the wire.
pub trait Outbound: Send + Sync {
    fn send(&self, frame: String) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}

/// Matches replies to the calls that issued them.
#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<String, PendingRequest>>,
    listener: Mutex<Option<Listener>>,
}

/// Removes a pending entry when the owning call finishes, whichever way
/// it finishes (reply, timeout, send failure or the future being dropped).
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.correlator.pending().remove(&self.id).is_some() {
            trace!(id = %self.id, "released unresolved pending request");
        }
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listener(&self) -> MutexGuard<'_, Option<Listener>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sends a request and waits for its reply. `timeout` bounds the whole
    /// exchange, including time spent queueing the frame.
    ///
    /// The reply is returned as-is; interpreting its status code is up to
    /// the caller.
    pub async fn call<O: Outbound, T: Serialize>(
        &self,
        out: &O,
        cmd: MessageType,
        params: Option<&T>,
        timeout: Duration,
    ) -> Result<Message, HubError> {
        let (tx, rx) = oneshot::channel();
        let id = self.register(tx);
        let _guard = PendingGuard {
            correlator: self,
            id: id.clone(),
        };

        let frame = Message::request(&id, cmd.clone(), params)
            .and_then(|m| serde_json::to_string(&m))
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;

        trace!(%id, ?cmd, "sending request");
        let exchange = async {
            out.send(frame).await?;
            match rx.await {
                Ok(result) => Ok::<_, HubError>(result?),
                // Slot dropped without a value: the correlator itself went away.
                Err(_) => Err(ConnectionError::Closed.into()),
            }
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%id, ?cmd, ?timeout, "request timed out");
                Err(TimeoutError(timeout).into())
            }
        }
    }

    /// Records a pending request under an id not currently outstanding.
    fn register(&self, slot: Slot) -> String {
        let mut map = self.pending();
        let mut id = uuid::Uuid::new_v4().to_string();
        while map.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        map.insert(
            id.clone(),
            PendingRequest {
                issued_at: Instant::now(),
                slot,
            },
        );
        id
    }

    /// Routes one inbound frame.
    ///
    /// A correlated frame resolves its pending request, or is discarded if
    /// there is none (late reply after a timeout). Uncorrelated frames go
    /// to the event listener, or are dropped if none is set.
    pub fn dispatch(&self, msg: Message) {
        if msg.is_correlated() {
            let entry = self.pending().remove(&msg.id);
            match entry {
                Some(req) => {
                    trace!(id = %msg.id, elapsed = ?req.issued_at.elapsed(), "resolved request");
                    let _ = req.slot.send(Ok(msg));
                }
                None => {
                    debug!(id = %msg.id, cmd = ?msg.cmd, "discarding reply with no pending request");
                }
            }
            return;
        }

        // Invoked outside the lock so the listener may replace or clear itself.
        let listener = self.listener().clone();
        match listener {
            Some(cb) => cb(HubEvent::from_message(msg)),
            None => trace!(cmd = ?msg.cmd, "no event listener set, dropping notification"),
        }
    }

    /// Fails every outstanding request with `err` and returns how many
    /// there were.
    pub fn fail_all(&self, err: ConnectionError) -> usize {
        let drained: Vec<_> = self.pending().drain().collect();
        let count = drained.len();
        for (_, req) in drained {
            let _ = req.slot.send(Err(err.clone()));
        }
        count
    }

    /// Number of requests awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Sets the listener for unsolicited messages, replacing any previous
    /// one.
    pub fn set_listener(&self, cb: EventCallback) {
        *self.listener() = Some(Arc::from(cb));
    }

    /// Removes the listener; later notifications are dropped.
    pub fn clear_listener(&self) {
        *self.listener() = None;
    }
}
