//! WebSocket message types.
//!
//! Every frame is a JSON envelope `{"type": ..., "data": ...}`. The set of
//! types is closed; frames with any other type are ignored so older clients
//! keep working when the server adds new ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::WsError;
use crate::types::{NotificationPayload, TicketUpdateEvent};

/// Known envelope types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Liveness check.
    Ping,
    /// Liveness reply.
    Pong,
    /// Generic notification signal.
    Notification,
    /// Ticket status delta.
    TicketUpdate,
    /// Comment added to a ticket.
    CommentAdded,
    /// New notification for the user.
    NewNotification,
}

impl MessageType {
    /// Parses a wire type name. Returns None for unknown types.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            "notification" => Some(Self::Notification),
            "ticket_update" => Some(Self::TicketUpdate),
            "comment_added" => Some(Self::CommentAdded),
            "new_notification" => Some(Self::NewNotification),
            _ => None,
        }
    }

    /// Returns the wire type name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Notification => "notification",
            Self::TicketUpdate => "ticket_update",
            Self::CommentAdded => "comment_added",
            Self::NewNotification => "new_notification",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw frame envelope, used in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Wire type name.
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Creates an envelope of a known type.
    #[must_use]
    pub fn new(kind: MessageType, data: Option<Value>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            data,
        }
    }

    /// Creates a ping envelope.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(MessageType::Ping, None)
    }

    /// Creates a pong envelope.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(MessageType::Pong, None)
    }

    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON envelope.
    pub fn from_text(text: &str) -> Result<Self, WsError> {
        serde_json::from_str(text).map_err(|e| WsError::Deserialization(e.to_string()))
    }

    /// Serializes the envelope to a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn to_text(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(|e| WsError::Serialization(e.to_string()))
    }

    /// Returns the known type, if any.
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.kind)
    }
}

/// Typed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Server liveness check.
    Ping,
    /// Server liveness reply.
    Pong,
    /// Generic notification signal; carries no state for this client.
    Notification(Option<Value>),
    /// Ticket status delta.
    TicketUpdate(TicketUpdateEvent),
    /// Comment added signal; carries no state for this client.
    CommentAdded(Option<Value>),
    /// New notification for the user.
    NewNotification(NotificationPayload),
    /// Any type this client does not know.
    Unknown(String),
}

impl InboundMessage {
    /// Converts an envelope into a typed message.
    ///
    /// # Errors
    ///
    /// Returns an error if a known type carries a missing or malformed
    /// payload. Unknown types are never an error.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, WsError> {
        let Some(kind) = envelope.message_type() else {
            return Ok(Self::Unknown(envelope.kind));
        };

        let message = match kind {
            MessageType::Ping => Self::Ping,
            MessageType::Pong => Self::Pong,
            MessageType::Notification => Self::Notification(envelope.data),
            MessageType::CommentAdded => Self::CommentAdded(envelope.data),
            MessageType::TicketUpdate => Self::TicketUpdate(payload(kind, envelope.data)?),
            MessageType::NewNotification => Self::NewNotification(payload(kind, envelope.data)?),
        };

        Ok(message)
    }

    /// Parses a text frame into a typed message.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not an envelope or a known type
    /// carries a malformed payload.
    pub fn parse(text: &str) -> Result<Self, WsError> {
        Self::from_envelope(Envelope::from_text(text)?)
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: MessageType,
    data: Option<Value>,
) -> Result<T, WsError> {
    let data =
        data.ok_or_else(|| WsError::Deserialization(format!("{} frame without data", kind)))?;
    serde_json::from_value(data).map_err(|e| WsError::Deserialization(format!("{}: {}", kind, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_roundtrip_names() {
        for kind in [
            MessageType::Ping,
            MessageType::Pong,
            MessageType::Notification,
            MessageType::TicketUpdate,
            MessageType::CommentAdded,
            MessageType::NewNotification,
        ] {
            assert_eq!(MessageType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageType::parse("presence"), None);
    }

    #[test]
    fn test_envelope_ping_serialize() {
        let json = Envelope::ping().to_text().expect("serialize");
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_envelope_with_data_serialize() {
        let envelope = Envelope::new(
            MessageType::Notification,
            Some(serde_json::json!({"id": 3})),
        );
        let json = envelope.to_text().expect("serialize");
        assert!(json.contains("\"type\":\"notification\""));
        assert!(json.contains("\"data\":{\"id\":3}"));
    }

    #[test]
    fn test_parse_new_notification() {
        let text = r#"{"type":"new_notification","data":{"id":1,"title":"X","message":"Y","created_at":"2024-01-01T00:00:00Z"}}"#;
        match InboundMessage::parse(text).expect("parse") {
            InboundMessage::NewNotification(payload) => {
                assert_eq!(payload.id, 1);
                assert_eq!(payload.title, "X");
                assert_eq!(payload.message, "Y");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ticket_update() {
        let text = r#"{"type":"ticket_update","data":{"ticket_id":"TCK-4","status":"closed","updated_at":"2024-01-01T00:00:00Z"}}"#;
        match InboundMessage::parse(text).expect("parse") {
            InboundMessage::TicketUpdate(event) => {
                assert_eq!(event.ticket_id, "TCK-4");
                assert_eq!(event.status, "closed");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ping_without_data() {
        let msg = InboundMessage::parse(r#"{"type":"ping"}"#).expect("parse");
        assert_eq!(msg, InboundMessage::Ping);
    }

    #[test]
    fn test_parse_comment_added_keeps_data() {
        let msg = InboundMessage::parse(r#"{"type":"comment_added","data":{"ticket_id":"T"}}"#)
            .expect("parse");
        assert!(matches!(msg, InboundMessage::CommentAdded(Some(_))));
    }

    #[test]
    fn test_parse_unknown_type() {
        let msg = InboundMessage::parse(r#"{"type":"presence","data":{"user":1}}"#)
            .expect("parse");
        assert_eq!(msg, InboundMessage::Unknown("presence".to_string()));
    }

    #[test]
    fn test_parse_known_type_missing_data() {
        let err = InboundMessage::parse(r#"{"type":"new_notification"}"#);
        assert!(matches!(err, Err(WsError::Deserialization(_))));
    }

    #[test]
    fn test_parse_known_type_bad_payload() {
        let err = InboundMessage::parse(r#"{"type":"ticket_update","data":{"status":1}}"#);
        assert!(matches!(err, Err(WsError::Deserialization(_))));
    }

    #[test]
    fn test_parse_not_json() {
        assert!(InboundMessage::parse("hello").is_err());
    }
}
