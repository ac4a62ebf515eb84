use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Deterministic key for the conversation between two users.
///
/// Both ids are ordered before joining, so `conversation_id(a, b)` and
/// `conversation_id(b, a)` always resolve to the same conversation.
pub fn conversation_id(a: Uuid, b: Uuid) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}_{}", low, high)
}

/// Kind of media attached to a direct message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "file" => Ok(Self::File),
            other => Err(format!("unknown media kind: {}", other)),
        }
    }
}

/// A stored one-to-one message, as delivered to both participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a message that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewDirectMessage {
    pub conversation_id: String,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
}

impl NewDirectMessage {
    pub fn new(
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
        media_url: Option<String>,
        media_type: Option<MediaKind>,
    ) -> Self {
        Self {
            conversation_id: conversation_id(sender_id, receiver_id),
            sender_id,
            receiver_id,
            content,
            media_url,
            media_type,
        }
    }
}

/// Result of marking a message as read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReceipt {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub read_at: DateTime<Utc>,
    /// False when the message had already been read before this call.
    pub newly_read: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Message,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub from_user_id: Option<Uuid>,
    pub link: Option<String>,
}
