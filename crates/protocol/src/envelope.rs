use serde::{Deserialize, Serialize};

use crate::constants::MessageType;

/// Envelope for all hub communication.
///
/// Requests carry `params`, responses carry `code`/`msg`/`data`, and
/// notifications pushed by the hub carry no `id`. The `params` and `data`
/// fields use `serde_json::value::RawValue` to defer deserialization until
/// the caller knows which payload type to expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub cmd: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Box<serde_json::value::RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Box<serde_json::value::RawValue>>,
}

/// Outcome reported by the hub in a response's `code` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    /// 2xx, or no code at all (plain acknowledgement).
    Ok,
    /// 401/403: the presented token was not accepted.
    Unauthorized,
    /// Any other code.
    Rejected { code: u16, message: String },
}

fn to_raw<T: Serialize>(value: Option<&T>) -> Result<Option<Box<serde_json::value::RawValue>>, serde_json::Error> {
    match value {
        Some(v) => {
            let json = serde_json::to_string(v)?;
            Ok(Some(serde_json::value::RawValue::from_string(json)?))
        }
        None => Ok(None),
    }
}

fn from_raw<T: for<'de> Deserialize<'de>>(
    raw: Option<&serde_json::value::RawValue>,
) -> Result<Option<T>, serde_json::Error> {
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
        None => Ok(None),
    }
}

impl Message {
    /// Creates a request with the given command and parameters.
    pub fn request<T: Serialize>(
        id: impl Into<String>,
        cmd: MessageType,
        params: Option<&T>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.into(),
            cmd,
            code: None,
            msg: None,
            params: to_raw(params)?,
            data: None,
        })
    }

    /// Creates an unsolicited notification (no correlation id).
    pub fn event<T: Serialize>(cmd: MessageType, data: Option<&T>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: String::new(),
            cmd,
            code: None,
            msg: None,
            params: None,
            data: to_raw(data)?,
        })
    }

    /// Creates a successful response to this request.
    pub fn reply<T: Serialize>(&self, data: Option<&T>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: self.id.clone(),
            cmd: self.cmd.clone(),
            code: Some(200),
            msg: Some("OK".into()),
            params: None,
            data: to_raw(data)?,
        })
    }

    /// Creates an error response to this request.
    pub fn reply_error(&self, code: u16, message: impl Into<String>) -> Self {
        Self {
            id: self.id.clone(),
            cmd: self.cmd.clone(),
            code: Some(code),
            msg: Some(message.into()),
            params: None,
            data: None,
        }
    }

    /// Returns `true` if this message carries a correlation id.
    pub fn is_correlated(&self) -> bool {
        !self.id.is_empty()
    }

    /// Interprets the response code.
    pub fn status(&self) -> ResponseStatus {
        match self.code {
            None => ResponseStatus::Ok,
            Some(c) if (200..300).contains(&c) => ResponseStatus::Ok,
            Some(401) | Some(403) => ResponseStatus::Unauthorized,
            Some(code) => ResponseStatus::Rejected {
                code,
                message: self.msg.clone().unwrap_or_default(),
            },
        }
    }

    /// Deserializes the request parameters into the given type.
    pub fn parse_params<T: for<'de> Deserialize<'de>>(&self) -> Result<Option<T>, serde_json::Error> {
        from_raw(self.params.as_deref())
    }

    /// Deserializes the response data into the given type.
    pub fn parse_data<T: for<'de> Deserialize<'de>>(&self) -> Result<Option<T>, serde_json::Error> {
        from_raw(self.data.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{CurrentActivityResponse, StartActivityRequest};

    #[test]
    fn request_carries_params() {
        let params = StartActivityRequest::new("1");
        let msg = Message::request("msg-1", MessageType::StartActivity, Some(&params)).unwrap();
        assert_eq!(msg.id, "msg-1");
        assert!(msg.params.is_some());
        assert!(msg.data.is_none());
        let parsed: StartActivityRequest = msg.parse_params().unwrap().unwrap();
        assert_eq!(parsed.activity_id, "1");
    }

    #[test]
    fn request_without_params_omits_fields() {
        let msg = Message::request::<()>("m1", MessageType::Sync, None).unwrap();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("params"));
        assert!(!json.contains("data"));
        assert!(!json.contains("code"));
    }

    #[test]
    fn reply_preserves_id_and_command() {
        let req = Message::request::<()>("req-42", MessageType::GetCurrentActivity, None).unwrap();
        let reply = req
            .reply(Some(&CurrentActivityResponse { result: "7".into() }))
            .unwrap();
        assert_eq!(reply.id, "req-42");
        assert_eq!(reply.cmd, MessageType::GetCurrentActivity);
        assert_eq!(reply.status(), ResponseStatus::Ok);
        let data: CurrentActivityResponse = reply.parse_data().unwrap().unwrap();
        assert_eq!(data.result, "7");
    }

    #[test]
    fn reply_error_status() {
        let req = Message::request::<()>("req-99", MessageType::StartActivity, None).unwrap();
        let reply = req.reply_error(404, "unknown activity");
        assert_eq!(reply.id, "req-99");
        assert_eq!(
            reply.status(),
            ResponseStatus::Rejected {
                code: 404,
                message: "unknown activity".into()
            }
        );
        assert_eq!(req.reply_error(401, "expired").status(), ResponseStatus::Unauthorized);
    }

    #[test]
    fn event_has_no_id() {
        let msg = Message::event(
            MessageType::StateDigestNotify,
            Some(&serde_json::json!({"activityId": "1"})),
        )
        .unwrap();
        assert!(!msg.is_correlated());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn parses_hub_response_without_code() {
        let json = r#"{"id":"a","cmd":"setup.sync"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.is_correlated());
        assert_eq!(msg.status(), ResponseStatus::Ok);
        assert!(msg.parse_data::<serde_json::Value>().unwrap().is_none());
    }

    #[test]
    fn parses_unknown_command() {
        let json = r#"{"cmd":"harmony.engine?helpdiscretes","data":{"x":1}}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.cmd, MessageType::Unknown);
        assert!(!msg.is_correlated());
    }
}
