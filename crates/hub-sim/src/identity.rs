//! Minimal HTTP/1.1 responder standing in for the cloud identity service.
//!
//! Answers every request on its own connection (`Connection: close`).
//! Like the real service it replies 200 with a null result for a wrong
//! password.

use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::server::SimState;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

pub(crate) async fn serve(
    listener: TcpListener,
    state: Arc<Mutex<SimState>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, _)) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle(stream, &state).await {
                            debug!("identity request failed: {e}");
                        }
                    });
                }
                Err(e) => tracing::error!("identity accept error: {e}"),
            }
        }
    }
}

async fn handle(mut stream: TcpStream, state: &Mutex<SimState>) -> std::io::Result<()> {
    let body = read_body(&mut stream).await?;

    let (status, json) = match serde_json::from_slice::<LoginRequest>(&body) {
        Ok(req) => {
            let mut st = state.lock().await;
            if req.email == st.config.email && req.password == st.config.password {
                let token = st.issue_identity_token();
                debug!(email = %req.email, "simulated identity login");
                (
                    "200 OK",
                    serde_json::json!({
                        "GetUserAuthTokenResult": {"AccountId": 1, "UserAuthToken": token}
                    }),
                )
            } else {
                ("200 OK", serde_json::json!({"GetUserAuthTokenResult": null}))
            }
        }
        Err(e) => ("400 Bad Request", serde_json::json!({"error": e.to_string()})),
    };

    let body = json.to_string();
    let resp = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(resp.as_bytes()).await?;
    stream.shutdown().await
}

/// Reads the request head and returns the body declared by
/// `Content-Length`.
async fn read_body(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(Vec::new());
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let len = content_length(&buf[..head_end]);
        let body_start = head_end + 4;
        if buf.len() >= body_start + len {
            return Ok(buf[body_start..body_start + len].to_vec());
        }
    }
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_length_case_insensitively() {
        let head = b"POST /x HTTP/1.1\r\nHost: a\r\ncontent-length: 42\r\nAccept: */*";
        assert_eq!(content_length(head), 42);
        let head = b"POST /x HTTP/1.1\r\nContent-Length:7";
        assert_eq!(content_length(head), 7);
        assert_eq!(content_length(b"GET / HTTP/1.1"), 0);
    }
}
