use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{DirectMessage, MediaKind};

/// Events sent FROM client TO server over the gateway.
///
/// Frames look like `{"event": "send-message", "data": {...}}`. Call
/// signaling payloads are kept as raw JSON and never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    SendMessage {
        receiver_id: Uuid,
        #[serde(default)]
        content: String,
        media_url: Option<String>,
        media_type: Option<MediaKind>,
    },

    #[serde(rename_all = "camelCase")]
    Typing { receiver_id: Uuid },

    #[serde(rename_all = "camelCase")]
    StopTyping { receiver_id: Uuid },

    #[serde(rename_all = "camelCase")]
    MarkAsRead { message_id: Uuid },

    CallUser { to: Uuid, offer: Value },

    AnswerCall { to: Uuid, answer: Value },

    IceCandidate { to: Uuid, candidate: Value },

    EndCall { to: Uuid },

    /// Explicit sign-out; closes the connection.
    Logout,
}

/// Events sent FROM server TO client over the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A message addressed to this user
    ReceiveMessage(DirectMessage),

    /// Canonical stored copy of a message this user sent
    MessageSent(DirectMessage),

    MessageError { error: String },

    #[serde(rename_all = "camelCase")]
    UserTyping { user_id: Uuid, is_typing: bool },

    #[serde(rename_all = "camelCase")]
    MessageRead { message_id: Uuid },

    IncomingCall { from: Uuid, offer: Value },

    CallAnswered { from: Uuid, answer: Value },

    IceCandidate { from: Uuid, candidate: Value },

    CallEnded { from: Uuid },

    #[serde(rename_all = "camelCase")]
    UserOnline { user_id: Uuid },

    #[serde(rename_all = "camelCase")]
    UserOffline { user_id: Uuid },

    /// Everyone else online at the moment this connection registered
    #[serde(rename_all = "camelCase")]
    OnlineUsers { user_ids: Vec<Uuid> },
}
