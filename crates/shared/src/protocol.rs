//! Realtime channel protocol: outbound client events, inbound payloads,
//! and normalization of the notification push union.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{Message, Notification, NotificationKind, UserSummary};

/// Room the server uses to address broadcasts at a single user.
pub fn user_room(user_id: &str) -> String {
    format!("user_{user_id}")
}

/// One frame on the realtime channel: an event name plus its payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Outbound events the client publishes.
///
/// Serializes to the `{"event": ..., "data": ...}` envelope directly, so a
/// serialized `ClientEvent` is a complete frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Join a server-side room (payload is the room id).
    JoinRoom(String),
    LeaveRoom(String),
    #[serde(rename_all = "camelCase")]
    SendMessage {
        receiver_id: String,
        message: Message,
        sender: UserSummary,
    },
    #[serde(rename_all = "camelCase")]
    TypingStart { receiver_id: String },
    #[serde(rename_all = "camelCase")]
    TypingStop { receiver_id: String },
}

impl ClientEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::LeaveRoom(_) => "leave-room",
            ClientEvent::SendMessage { .. } => "send-message",
            ClientEvent::TypingStart { .. } => "typing-start",
            ClientEvent::TypingStop { .. } => "typing-stop",
        }
    }
}

/// Payload of an inbound `new-message` event.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NewMessagePayload {
    pub message: Message,
}

/// Payload of an inbound `new-notification` event.
///
/// The server sends either a fully formed record or a minimal descriptor;
/// both collapse to a canonical [`Notification`] before leaving the event
/// router, so stores never see the ambiguity.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NotificationPush {
    Full { notification: Notification },
    Descriptor(NotificationDescriptor),
}

/// The minimal descriptor shape: no identifier, owner, or timestamp.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDescriptor {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub booking_id: Option<String>,
}

impl NotificationPush {
    /// Collapse to the canonical shape. `owner` is the connected user;
    /// descriptors get a synthesized identifier and a fresh timestamp.
    pub fn into_notification(self, owner: &str) -> Notification {
        match self {
            NotificationPush::Full { notification } => notification,
            NotificationPush::Descriptor(d) => Notification {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: owner.to_string(),
                kind: d.kind,
                title: d.title,
                message: d.message,
                data: match d.booking_id {
                    Some(booking_id) => serde_json::json!({ "bookingId": booking_id }),
                    None => serde_json::Value::Null,
                },
                read: false,
                action_url: None,
                created_at: Utc::now(),
            },
        }
    }
}
