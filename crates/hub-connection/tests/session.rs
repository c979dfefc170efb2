//! End-to-end sessions against the in-process hub simulator.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use harmony_hub_connection::{
    AuthError, ClientConfig, ConnectionError, ConnectionState, Credential, Exchanger, ExchangerConfig,
    HubClient, HubError, HubEvent, ProtocolError, SessionToken, TimeoutError,
};
use harmony_hub_sim::{HubSimulator, SimConfig};
use harmony_protocol::messages::{HoldActionRequest, HoldStatus};
use harmony_protocol::{HubAddress, Message, MessageType};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

async fn connect(sim: &HubSimulator, config: ClientConfig) -> HubClient {
    let token = SessionToken::new(sim.issue_session_token().await);
    HubClient::connect(sim.address(), &token, config)
        .await
        .expect("connect to simulator")
}

#[tokio::test]
async fn login_then_fetch_config() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let exchanger = Exchanger::new(ExchangerConfig {
        identity_url: sim.identity_url(),
        ..ExchangerConfig::default()
    })
    .unwrap();
    let credential = Credential::new(SimConfig::DEFAULT_EMAIL, SimConfig::DEFAULT_PASSWORD);

    let client = HubClient::login(&credential, sim.address(), &exchanger, ClientConfig::default())
        .await
        .unwrap();
    assert_eq!(client.state(), ConnectionState::Ready);

    let config = client.get_config().await.unwrap();
    let watch_tv = config.activity("1").expect("activity 1");
    assert_eq!(watch_tv.label, "Watch TV");
    assert!(config.device("200").unwrap().supports("Mute"));

    client.disconnect(true).await;
}

#[tokio::test]
async fn login_with_wrong_password_fails_before_hub() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let exchanger = Exchanger::new(ExchangerConfig {
        identity_url: sim.identity_url(),
        ..ExchangerConfig::default()
    })
    .unwrap();

    let err = HubClient::login(
        &Credential::new(SimConfig::DEFAULT_EMAIL, "nope"),
        sim.address(),
        &exchanger,
        ClientConfig::default(),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err, HubError::Auth(AuthError::InvalidCredentials));
    assert_eq!(sim.session_count().await, 0);
}

#[tokio::test]
async fn start_activity_and_read_it_back() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let client = connect(&sim, ClientConfig::default()).await;

    assert_eq!(client.get_current_activity().await.unwrap(), "-1");
    client.start_activity("1").await.unwrap();
    assert_eq!(client.get_current_activity().await.unwrap(), "1");
    assert_eq!(sim.current_activity().await, "1");

    client.power_off().await.unwrap();
    assert_eq!(sim.current_activity().await, "-1");
}

#[tokio::test]
async fn unknown_activity_is_rejected() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let client = connect(&sim, ClientConfig::default()).await;

    let err = client.start_activity("99").await.unwrap_err();
    assert!(matches!(
        err,
        HubError::Protocol(ProtocolError::Rejected { code: 404, .. })
    ));
    assert_eq!(sim.current_activity().await, "-1");
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[tokio::test]
async fn send_command_presses_and_releases() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let client = connect(&sim, ClientConfig::default()).await;

    client.send_command("200", "VolumeUp").await.unwrap();

    let holds = sim.received_of(MessageType::HoldAction).await;
    let statuses: Vec<HoldStatus> = holds
        .iter()
        .map(|m| m.parse_params::<HoldActionRequest>().unwrap().unwrap().status)
        .collect();
    assert_eq!(statuses, vec![HoldStatus::Press, HoldStatus::Release]);

    let err = client.send_command("200", "SelfDestruct").await.unwrap_err();
    assert!(matches!(
        err,
        HubError::Protocol(ProtocolError::Rejected { code: 404, .. })
    ));
}

#[tokio::test]
async fn sync_is_acknowledged() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let client = connect(&sim, ClientConfig::default()).await;

    client.sync().await.unwrap();
    assert_eq!(sim.received_of(MessageType::Sync).await.len(), 1);
}

#[tokio::test]
async fn unanswered_request_times_out_without_killing_session() {
    let sim = HubSimulator::start(SimConfig::default().unanswered(MessageType::GetCurrentActivity))
        .await
        .unwrap();
    let timeout = Duration::from_millis(200);
    let client = connect(&sim, ClientConfig::default().with_request_timeout(timeout)).await;

    let err = client.get_current_activity().await.unwrap_err();
    assert_eq!(err, HubError::Timeout(TimeoutError(timeout)));

    assert_eq!(client.state(), ConnectionState::Ready);
    client.get_config().await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_resolve_independently() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let client = Arc::new(connect(&sim, ClientConfig::default()).await);

    let mut tasks = Vec::new();
    for i in 0..10 {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                client.get_config().await.map(|c| c.activities.len())
            } else {
                client.get_current_activity().await.map(|a| a.len())
            }
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let n = task.await.unwrap().unwrap();
        if i % 2 == 0 {
            assert_eq!(n, 3);
        } else {
            assert_eq!(n, "-1".len());
        }
    }
}

#[tokio::test]
async fn session_token_is_single_use() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let token = SessionToken::new(sim.issue_session_token().await);

    let first = HubClient::connect(sim.address(), &token, ClientConfig::default())
        .await
        .unwrap();
    first.disconnect(true).await;

    let err = HubClient::connect(sim.address(), &token, ClientConfig::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ConnectionError::AuthRejected(_)));
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let raw = sim.issue_session_token().await;
    sim.expire_session_token(&raw).await;

    let err = HubClient::connect(sim.address(), &SessionToken::new(raw), ClientConfig::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ConnectionError::AuthRejected(_)));
}

#[tokio::test]
async fn disconnect_fails_every_pending_call() {
    let sim = HubSimulator::start(SimConfig::default().unanswered(MessageType::GetConfig))
        .await
        .unwrap();
    let client = Arc::new(connect(&sim, ClientConfig::default()).await);

    let mut pending = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        pending.push(tokio::spawn(async move { client.get_config().await }));
    }
    while sim.received_of(MessageType::GetConfig).await.len() < 4 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    client.disconnect(true).await;
    client.disconnect(true).await;

    for task in pending {
        assert_eq!(
            task.await.unwrap().unwrap_err(),
            HubError::Connection(ConnectionError::Closed)
        );
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(
        client.sync().await.unwrap_err(),
        HubError::Connection(ConnectionError::NotReady)
    );
}

#[tokio::test]
async fn hub_closing_the_session_disconnects_the_client() {
    let sim = HubSimulator::start(SimConfig::default().unanswered(MessageType::GetConfig))
        .await
        .unwrap();
    let client = Arc::new(connect(&sim, ClientConfig::default()).await);
    let mut states = client.subscribe_state();

    let c = client.clone();
    let pending = tokio::spawn(async move { c.get_config().await });
    while sim.received_of(MessageType::GetConfig).await.is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    sim.close_sessions().await;

    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|s| *s == ConnectionState::Disconnected),
    )
    .await
    .expect("disconnect observed")
    .unwrap();
    assert_eq!(
        pending.await.unwrap().unwrap_err(),
        HubError::Connection(ConnectionError::Closed)
    );
}

/// A hub that accepts the session token and closes in the same flush.
async fn accept_then_close() -> HubAddress {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(frame)) = ws.next().await {
            if let WsMessage::Text(text) = frame {
                let request: Message = serde_json::from_str(text.as_str()).unwrap();
                let reply = serde_json::to_string(&request.reply::<()>(None).unwrap()).unwrap();
                ws.feed(WsMessage::Text(reply.into())).await.unwrap();
                ws.feed(WsMessage::Close(None)).await.unwrap();
                let _ = ws.flush().await;
                break;
            }
        }
    });
    HubAddress::new("127.0.0.1", port)
}

#[tokio::test]
async fn hub_closing_during_handshake_never_leaves_client_ready() {
    for _ in 0..10 {
        let address = accept_then_close().await;
        let token = SessionToken::new("token");

        match HubClient::connect(address, &token, ClientConfig::default()).await {
            Err(err) => assert!(matches!(err, ConnectionError::Refused(_)), "{err:?}"),
            Ok(client) => {
                let mut states = client.subscribe_state();
                tokio::time::timeout(
                    Duration::from_secs(5),
                    states.wait_for(|s| *s == ConnectionState::Disconnected),
                )
                .await
                .expect("disconnect observed")
                .unwrap();
                assert_eq!(
                    client.sync().await.unwrap_err(),
                    HubError::Connection(ConnectionError::NotReady)
                );
            }
        }
    }
}

#[tokio::test]
async fn activity_changes_reach_the_listener() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let client = connect(&sim, ClientConfig::default()).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.set_event_listener(Box::new(move |event| {
        let _ = tx.send(event);
    }));

    client.start_activity("2").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        HubEvent::ActivityChanged {
            activity_id,
            status,
        } => {
            assert_eq!(activity_id, "2");
            assert_eq!(status, 2);
        }
        other => panic!("expected ActivityChanged, got {other:?}"),
    }
}

#[tokio::test]
async fn unrecognised_pushes_pass_through() {
    let sim = HubSimulator::start(SimConfig::default()).await.unwrap();
    let client = connect(&sim, ClientConfig::default()).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.set_event_listener(Box::new(move |event| {
        let _ = tx.send(event);
    }));

    let push = Message::event(MessageType::Sync, Some(&serde_json::json!({"progress": 50})))
        .unwrap();
    assert_eq!(sim.push(&push).await, 1);

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, HubEvent::Notification(m) if m.cmd == MessageType::Sync));
}
