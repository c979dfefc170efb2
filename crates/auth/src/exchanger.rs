//! Credential exchanger façade.

use std::time::Duration;

use harmony_protocol::HubAddress;
use harmony_protocol::constants::PAIR_DEVICE_SUFFIX;
use tracing::info;

use crate::AuthError;
use crate::types::{Credential, IdentityToken, SessionToken};

/// Identity service endpoint that issues user auth tokens.
pub const DEFAULT_IDENTITY_URL: &str =
    "https://svcs.myharmony.com/CompositeSecurityServices/Security.svc/json/GetUserAuthToken";

/// Settings for the credential exchange.
#[derive(Debug, Clone)]
pub struct ExchangerConfig {
    /// URL of the identity service login endpoint.
    pub identity_url: String,
    /// Timeout for the identity service request.
    pub http_timeout: Duration,
    /// Timeout for each leg (connect, reply) of the hub pairing exchange.
    pub hub_timeout: Duration,
    /// Name this client announces to the hub when pairing.
    pub client_name: String,
}

fn default_client_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "harmony".into())
}

impl Default for ExchangerConfig {
    fn default() -> Self {
        Self {
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            http_timeout: Duration::from_secs(15),
            hub_timeout: Duration::from_secs(10),
            client_name: default_client_name(),
        }
    }
}

/// Performs the two-step credential exchange.
///
/// Both steps are plain request/response calls with no state kept between
/// them, so either may be retried with the same inputs.
pub struct Exchanger {
    http: reqwest::Client,
    config: ExchangerConfig,
}

impl Exchanger {
    /// Creates an exchanger with the given settings.
    pub fn new(config: ExchangerConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AuthError::NetworkFailure(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Exchanges an email and password for an identity token.
    pub async fn login(&self, email: &str, password: &str) -> Result<IdentityToken, AuthError> {
        crate::identity::request_user_token(&self.http, &self.config.identity_url, email, password)
            .await
    }

    /// Exchanges an identity token for a session token scoped to `hub`.
    pub async fn swap_auth_token(
        &self,
        hub: &HubAddress,
        identity: &IdentityToken,
    ) -> Result<SessionToken, AuthError> {
        let name = format!("{}{PAIR_DEVICE_SUFFIX}", self.config.client_name);
        crate::pairing::pair(hub, identity, &name, self.config.hub_timeout).await
    }

    /// Runs both steps: login, then swap for a session token.
    pub async fn exchange(
        &self,
        credential: &Credential,
        hub: &HubAddress,
    ) -> Result<SessionToken, AuthError> {
        let identity = self.login(&credential.email, &credential.password).await?;
        info!(email = %credential.email, "obtained identity token");
        let session = self.swap_auth_token(hub, &identity).await?;
        info!(hub = %hub, "obtained hub session token");
        Ok(session)
    }
}
