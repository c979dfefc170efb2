//! Identity service client (step one of the exchange).
//!
//! Async HTTP client using `reqwest`. The service answers every request
//! with HTTP 200 and signals bad credentials with a null result, so both
//! that and a 401/403 map to [`AuthError::InvalidCredentials`].

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::AuthError;
use crate::types::IdentityToken;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(rename = "GetUserAuthTokenResult", default)]
    result: Option<UserAuthTokenResult>,
}

#[derive(Debug, Deserialize)]
struct UserAuthTokenResult {
    #[serde(rename = "AccountId", default)]
    account_id: i64,
    #[serde(rename = "UserAuthToken", default)]
    user_auth_token: String,
}

/// Posts the credential to the identity endpoint and extracts the token.
pub(crate) async fn request_user_token(
    http: &reqwest::Client,
    url: &str,
    email: &str,
    password: &str,
) -> Result<IdentityToken, AuthError> {
    debug!(%url, %email, "requesting user auth token");

    let resp = http
        .post(url)
        .json(&LoginRequest { email, password })
        .send()
        .await
        .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AuthError::InvalidCredentials);
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "identity service error");
        return Err(AuthError::UnexpectedResponse(format!(
            "HTTP {}: {body}",
            status.as_u16()
        )));
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;
    let parsed: LoginResponse = serde_json::from_slice(&body)
        .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;

    let result = parsed.result.ok_or(AuthError::InvalidCredentials)?;
    if result.user_auth_token.is_empty() {
        return Err(AuthError::UnexpectedResponse("empty user auth token".into()));
    }

    debug!(account_id = result.account_id, "identity service accepted credential");
    Ok(IdentityToken::new(result.user_auth_token))
}
