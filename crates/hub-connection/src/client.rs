//! High-level hub operations over an authenticated [`Transport`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use harmony_auth::{Credential, Exchanger, SessionToken};
use harmony_protocol::constants::POWER_OFF_ACTIVITY_ID;
use harmony_protocol::messages::{
    CurrentActivityResponse, HoldActionRequest, HoldStatus, StartActivityRequest,
};
use harmony_protocol::types::IrAction;
use harmony_protocol::{Configuration, HubAddress, Message, MessageType, ResponseStatus};

use crate::correlator::{Correlator, EventCallback};
use crate::error::{ConnectionError, HubError, ProtocolError};
use crate::transport::Transport;
use crate::types::{ClientConfig, ConnectionState};

/// A ready session with one hub.
///
/// All operations may be issued concurrently from multiple tasks; each
/// gets its own correlation id and its own timeout.
pub struct HubClient {
    transport: Transport,
    correlator: Arc<Correlator>,
    config: ClientConfig,
}

impl HubClient {
    /// Connects with an already exchanged session token.
    pub async fn connect(
        address: HubAddress,
        token: &SessionToken,
        config: ClientConfig,
    ) -> Result<Self, ConnectionError> {
        let correlator = Arc::new(Correlator::new());
        let transport = Transport::connect(&address, token, correlator.clone(), &config).await?;
        Ok(Self {
            transport,
            correlator,
            config,
        })
    }

    /// Exchanges `credential` for a session token and connects with it.
    pub async fn login(
        credential: &Credential,
        address: HubAddress,
        exchanger: &Exchanger,
        config: ClientConfig,
    ) -> Result<Self, HubError> {
        let token = exchanger.exchange(credential, &address).await?;
        Ok(Self::connect(address, &token, config).await?)
    }

    pub fn address(&self) -> &HubAddress {
        self.transport.address()
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Watches lifecycle transitions, e.g. to notice the hub going away.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.subscribe()
    }

    /// Receives hub notifications (activity changes and anything else the
    /// hub pushes). Replaces any previous listener.
    pub fn set_event_listener(&self, cb: EventCallback) {
        self.correlator.set_listener(cb);
    }

    /// Issues a raw request and returns the reply once it reports success.
    pub async fn call<T: Serialize + Sync>(
        &self,
        cmd: MessageType,
        params: Option<&T>,
    ) -> Result<Message, HubError> {
        let reply = self
            .correlator
            .call(&self.transport, cmd, params, self.config.request_timeout)
            .await?;
        match reply.status() {
            ResponseStatus::Ok => Ok(reply),
            ResponseStatus::Unauthorized => Err(ProtocolError::Rejected {
                code: reply.code.unwrap_or(401),
                message: reply.msg.unwrap_or_default(),
            }
            .into()),
            ResponseStatus::Rejected { code, message } => {
                Err(ProtocolError::Rejected { code, message }.into())
            }
        }
    }

    /// Fetches the hub configuration (activities and devices).
    pub async fn get_config(&self) -> Result<Configuration, HubError> {
        let reply = self.call::<()>(MessageType::GetConfig, None).await?;
        let config = reply
            .parse_data::<Configuration>()
            .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?
            .ok_or_else(|| ProtocolError::MalformedResponse("configuration missing".into()))?;
        debug!(
            activities = config.activities.len(),
            devices = config.devices.len(),
            "fetched hub configuration"
        );
        Ok(config)
    }

    /// Id of the running activity; `"-1"` means powered off.
    pub async fn get_current_activity(&self) -> Result<String, HubError> {
        let reply = self
            .call::<()>(MessageType::GetCurrentActivity, None)
            .await?;
        let resp = reply
            .parse_data::<CurrentActivityResponse>()
            .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))?
            .ok_or_else(|| ProtocolError::MalformedResponse("current activity missing".into()))?;
        Ok(resp.result)
    }

    /// Starts the activity with the given id.
    pub async fn start_activity(&self, activity_id: &str) -> Result<(), HubError> {
        let params = StartActivityRequest::new(activity_id);
        self.call(MessageType::StartActivity, Some(&params)).await?;
        info!(activity_id, "activity started");
        Ok(())
    }

    /// Sends one IR command to a device: a press followed by a release.
    pub async fn send_command(&self, device_id: &str, command: &str) -> Result<(), HubError> {
        let action = IrAction::ir_command(device_id, command);
        for status in [HoldStatus::Press, HoldStatus::Release] {
            let params = HoldActionRequest::new(&action, status)
                .map_err(|e| ProtocolError::Encode(e.to_string()))?;
            self.call(MessageType::HoldAction, Some(&params)).await?;
        }
        debug!(device_id, command, "command sent");
        Ok(())
    }

    /// Asks the hub to sync its configuration with the cloud.
    pub async fn sync(&self) -> Result<(), HubError> {
        self.call::<()>(MessageType::Sync, None).await?;
        Ok(())
    }

    /// Turns everything off by starting the power-off activity.
    pub async fn power_off(&self) -> Result<(), HubError> {
        self.start_activity(POWER_OFF_ACTIVITY_ID).await
    }

    /// Ends the session; see [`Transport::disconnect`].
    pub async fn disconnect(&self, send_close: bool) {
        self.transport.disconnect(send_close).await;
    }
}
