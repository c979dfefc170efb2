//! One simulated hub session: WebSocket upgrade, request dispatch and the
//! hub's replies.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use harmony_protocol::messages::{
    AuthenticateRequest, CurrentActivityResponse, HoldActionRequest, PairRequest, PairResponse,
    StartActivityRequest,
};
use harmony_protocol::{Message, MessageType};

use crate::SimError;
use crate::server::SimState;

/// What the hub does in response to one request.
#[derive(Default)]
struct Outcome {
    reply: Option<Message>,
    /// Notification pushed to every session after the reply.
    broadcast: Option<Message>,
}

impl Outcome {
    fn reply(msg: Message) -> Self {
        Self {
            reply: Some(msg),
            broadcast: None,
        }
    }
}

/// Serves a single client connection until it closes or the simulator
/// shuts down.
pub(crate) async fn serve(
    stream: TcpStream,
    state: Arc<Mutex<SimState>>,
    cancel: CancellationToken,
) -> Result<(), SimError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    let (tx, mut rx) = mpsc::channel::<tungstenite::Message>(64);
    let session_id = state.lock().await.register_session(tx.clone());

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let closing = matches!(frame, tungstenite::Message::Close(_));
            if write.send(frame).await.is_err() || closing {
                break;
            }
        }
    });

    let mut authenticated = false;
    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            frame = read.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    let msg: Message = match serde_json::from_str(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            warn!("simulator received malformed frame: {e}");
                            continue;
                        }
                    };
                    let outcome = handle(&state, msg, &mut authenticated).await;
                    if let Some(reply) = outcome.reply {
                        let json = serde_json::to_string(&reply)?;
                        if tx.send(tungstenite::Message::Text(json.into())).await.is_err() {
                            break Ok(());
                        }
                    }
                    if let Some(event) = outcome.broadcast {
                        state.lock().await.broadcast(&event);
                    }
                }
                Some(Ok(tungstenite::Message::Close(_))) | None => break Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            }
        }
    };

    state.lock().await.sessions.remove(&session_id);
    drop(tx);
    let _ = writer.await;
    debug!(session_id, "simulated session closed");
    result
}

fn ok<T: Serialize>(msg: &Message, data: Option<&T>) -> Message {
    msg.reply(data)
        .unwrap_or_else(|e| msg.reply_error(500, e.to_string()))
}

async fn handle(state: &Mutex<SimState>, msg: Message, authenticated: &mut bool) -> Outcome {
    let mut st = state.lock().await;
    st.received.push(msg.clone());

    if st.config.unanswered.contains(&msg.cmd) {
        debug!(cmd = ?msg.cmd, "simulator ignoring request");
        return Outcome::default();
    }

    match msg.cmd {
        MessageType::Pair => Outcome::reply(pair(&mut st, &msg)),
        MessageType::Authenticate => {
            let reply = authenticate(&mut st, &msg);
            *authenticated = reply.code == Some(200);
            Outcome::reply(reply)
        }
        _ if !*authenticated => Outcome::reply(msg.reply_error(401, "not authenticated")),
        MessageType::GetConfig => Outcome::reply(ok(&msg, Some(&st.config.configuration))),
        MessageType::GetCurrentActivity => {
            let resp = CurrentActivityResponse {
                result: st.current_activity.clone(),
            };
            Outcome::reply(ok(&msg, Some(&resp)))
        }
        MessageType::StartActivity => start_activity(&mut st, &msg),
        MessageType::HoldAction => Outcome::reply(hold_action(&st, &msg)),
        MessageType::Sync => Outcome::reply(ok::<()>(&msg, None)),
        MessageType::StateDigestNotify | MessageType::Unknown => {
            Outcome::reply(msg.reply_error(400, "unsupported command"))
        }
    }
}

fn pair(st: &mut SimState, msg: &Message) -> Message {
    let Ok(Some(req)) = msg.parse_params::<PairRequest>() else {
        return msg.reply_error(400, "missing pairing parameters");
    };
    if !st.identity_tokens.contains(&req.token) {
        return msg.reply_error(401, "unknown identity token");
    }
    let identity = st.issue_session_token();
    debug!(client = %req.name, "simulator paired client");
    ok(
        msg,
        Some(&PairResponse {
            identity: Some(identity),
            status: PairResponse::SUCCEEDED.into(),
        }),
    )
}

fn authenticate(st: &mut SimState, msg: &Message) -> Message {
    let Ok(Some(req)) = msg.parse_params::<AuthenticateRequest>() else {
        return msg.reply_error(400, "missing token");
    };
    match st.session_tokens.get_mut(&req.token) {
        Some(consumed) if !*consumed => {
            *consumed = true;
            ok::<()>(msg, None)
        }
        _ => msg.reply_error(401, "invalid or expired session token"),
    }
}

fn start_activity(st: &mut SimState, msg: &Message) -> Outcome {
    let Ok(Some(req)) = msg.parse_params::<StartActivityRequest>() else {
        return Outcome::reply(msg.reply_error(400, "missing activityId"));
    };
    if st.config.configuration.activity(&req.activity_id).is_none() {
        return Outcome::reply(msg.reply_error(404, "unknown activity"));
    }

    st.current_activity = req.activity_id.clone();
    let broadcast = if st.config.notify_activity_changes {
        let digest = st.config.state_digest(&req.activity_id);
        Message::event(MessageType::StateDigestNotify, Some(&digest)).ok()
    } else {
        None
    };

    Outcome {
        reply: Some(ok::<()>(msg, None)),
        broadcast,
    }
}

fn hold_action(st: &SimState, msg: &Message) -> Message {
    let Ok(Some(req)) = msg.parse_params::<HoldActionRequest>() else {
        return msg.reply_error(400, "missing action");
    };
    let Ok(action) = req.parse_action() else {
        return msg.reply_error(400, "malformed action");
    };
    match st.config.configuration.device(&action.device_id) {
        Some(device) if device.supports(&action.command) => ok::<()>(msg, None),
        Some(_) => msg.reply_error(404, "unknown command"),
        None => msg.reply_error(404, "unknown device"),
    }
}
