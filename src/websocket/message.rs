use std::sync::Arc;

use axum::{body::Bytes, extract::ws::Message};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::notification::EventPayload;

/// Messages sent from client to server.
///
/// `kind` is accepted but not interpreted: every well-formed message is relayed to
/// the group as a user update.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type", default = "default_client_type")]
    pub kind: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

fn default_client_type() -> String {
    "user_update".to_string()
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "user_update")]
    UserUpdate(EventPayload),
}

/// An item queued for a connection's writer
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Serialized by the writer
    Raw(ServerMessage),
    /// Serialized once by the publisher and shared between recipients
    Preserialized(Arc<str>),
    /// Protocol-level ping frame
    Ping,
}

impl OutboundMessage {
    pub fn preserialized(message: &ServerMessage) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(message)?;
        Ok(Self::Preserialized(Arc::from(json)))
    }

    pub fn to_json(&self) -> Result<Option<String>, serde_json::Error> {
        match self {
            Self::Raw(message) => serde_json::to_string(message).map(Some),
            Self::Preserialized(json) => Ok(Some(json.to_string())),
            Self::Ping => Ok(None),
        }
    }

    /// Convert into the frame written to the socket
    pub fn into_frame(self) -> Result<Message, serde_json::Error> {
        match self.to_json()? {
            Some(text) => Ok(Message::Text(text.into())),
            None => Ok(Message::Ping(Bytes::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_message() {
        let msg = ClientMessage::parse(r#"{"type":"x","data":{"v":1}}"#).unwrap();
        assert_eq!(msg.kind, "x");
        assert_eq!(Value::Object(msg.data), json!({"v": 1}));
    }

    #[test]
    fn test_parse_defaults() {
        let msg = ClientMessage::parse("{}").unwrap();
        assert_eq!(msg.kind, "user_update");
        assert!(msg.data.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(ClientMessage::parse("not json").is_err());
        assert!(ClientMessage::parse("[1, 2]").is_err());
        assert!(ClientMessage::parse(r#"{"type":"x","data":5}"#).is_err());
        assert!(ClientMessage::parse(r#"{"type":7,"data":{}}"#).is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let mut data = Map::new();
        data.insert("v".to_string(), json!(1));
        let msg = ServerMessage::UserUpdate(EventPayload::Relay(data));

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "user_update", "data": {"v": 1}}));
    }

    #[test]
    fn test_preserialized_matches_raw() {
        let msg = ServerMessage::UserUpdate(EventPayload::Relay(Map::new()));
        let raw = OutboundMessage::Raw(msg.clone()).to_json().unwrap();
        let pre = OutboundMessage::preserialized(&msg).unwrap().to_json().unwrap();
        assert_eq!(raw, pre);
    }

    #[test]
    fn test_ping_frame() {
        let frame = OutboundMessage::Ping.into_frame().unwrap();
        assert!(matches!(frame, Message::Ping(_)));
    }
}
