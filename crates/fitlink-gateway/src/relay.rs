use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use fitlink_types::events::ServerEvent;
use fitlink_types::models::{DirectMessage, MediaKind, NewDirectMessage, NewNotification, NotificationKind};

use crate::dispatcher::Session;
use crate::error::RelayError;
use crate::presence::PresenceRegistry;
use crate::store::{MessageStore, NotificationSink};

/// Longest accepted message body, in characters.
pub const MAX_CONTENT_CHARS: usize = 4096;

/// Characters of the body copied into the recipient's notification.
const PREVIEW_CHARS: usize = 100;

/// A `send-message` request as it arrived from the sender.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub receiver_id: Uuid,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
}

/// Stores a direct message, pushes it to the recipient if they are online,
/// and acknowledges the sender with the stored copy.
#[derive(Clone)]
pub struct MessageRelay {
    presence: PresenceRegistry,
    store: Arc<dyn MessageStore>,
    notifications: Arc<dyn NotificationSink>,
}

impl MessageRelay {
    pub fn new(
        presence: PresenceRegistry,
        store: Arc<dyn MessageStore>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            presence,
            store,
            notifications,
        }
    }

    /// The sender always gets exactly one answer: `message-sent` with the
    /// stored message, or `message-error`.
    pub async fn send(&self, sender: &Session, outgoing: OutgoingMessage) -> Result<DirectMessage, RelayError> {
        match self.store_and_forward(sender.user_id(), outgoing).await {
            Ok(message) => {
                sender.emit(ServerEvent::MessageSent(message.clone()));
                Ok(message)
            }
            Err(e) => {
                match &e {
                    RelayError::InvalidMessage(reason) => {
                        debug!("{} rejected message: {}", sender.user_id(), reason)
                    }
                    other => error!("{} message not stored: {:?}", sender.user_id(), other),
                }
                sender.emit(ServerEvent::MessageError { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn store_and_forward(&self, sender_id: Uuid, outgoing: OutgoingMessage) -> Result<DirectMessage, RelayError> {
        let new = validate(sender_id, outgoing)?;

        let store = self.store.clone();
        let message = tokio::task::spawn_blocking(move || store.create_message(&new))
            .await
            .map_err(anyhow::Error::from)??;

        // At most once: a push that fails after the lookup is not retried.
        match self.presence.lookup(message.receiver_id).await {
            Some(handle) => {
                if handle.send(ServerEvent::ReceiveMessage(message.clone())) {
                    info!("{} -> {} message {} delivered", sender_id, message.receiver_id, message.id);
                } else {
                    debug!("{} -> {} message {} push failed, connection closing", sender_id, message.receiver_id, message.id);
                }
            }
            None => {
                info!("{} -> {} message {} stored, recipient offline", sender_id, message.receiver_id, message.id);
            }
        }

        self.notify_recipient(&message);

        Ok(message)
    }

    /// Fire and forget; a failed notification never fails the send.
    fn notify_recipient(&self, message: &DirectMessage) {
        let notification = NewNotification {
            user_id: message.receiver_id,
            kind: NotificationKind::Message,
            title: "New message".to_string(),
            message: preview(message),
            from_user_id: Some(message.sender_id),
            link: Some(format!("/messages/{}", message.sender_id)),
        };

        let sink = self.notifications.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = sink.enqueue(&notification) {
                warn!("Failed to enqueue message notification for {}: {}", notification.user_id, e);
            }
        });
    }
}

fn validate(sender_id: Uuid, outgoing: OutgoingMessage) -> Result<NewDirectMessage, RelayError> {
    if outgoing.receiver_id == sender_id {
        return Err(RelayError::InvalidMessage("Cannot send a message to yourself".into()));
    }

    let content = outgoing.content.trim().to_string();
    let media_url = outgoing
        .media_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());

    if content.is_empty() && media_url.is_none() {
        return Err(RelayError::InvalidMessage("Message content is required".into()));
    }

    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(RelayError::InvalidMessage(format!(
            "Message too long: {} characters (maximum {})",
            len, MAX_CONTENT_CHARS
        )));
    }

    // A media kind without a url means nothing.
    let media_type = media_url.as_ref().and(outgoing.media_type);

    Ok(NewDirectMessage::new(
        sender_id,
        outgoing.receiver_id,
        content,
        media_url,
        media_type,
    ))
}

fn preview(message: &DirectMessage) -> String {
    if message.content.is_empty() {
        return "Sent you an attachment".to_string();
    }

    let mut chars = message.content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
