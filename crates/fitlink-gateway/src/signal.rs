use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, trace};
use uuid::Uuid;

use fitlink_types::events::ServerEvent;
use fitlink_types::models::ReadReceipt;

use crate::dispatcher::Session;
use crate::error::RelayError;
use crate::presence::PresenceRegistry;
use crate::store::MessageStore;

/// What a signal carries. Call payloads are opaque JSON and are never
/// inspected here.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalPayload {
    Typing(bool),
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
    HangUp,
}

/// A signal in flight from one user to another. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEnvelope {
    pub from: Uuid,
    pub to: Uuid,
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    pub fn new(from: Uuid, to: Uuid, payload: SignalPayload) -> Self {
        Self { from, to, payload }
    }

    fn kind(&self) -> &'static str {
        match self.payload {
            SignalPayload::Typing(_) => "typing",
            SignalPayload::Offer(_) => "offer",
            SignalPayload::Answer(_) => "answer",
            SignalPayload::IceCandidate(_) => "ice",
            SignalPayload::HangUp => "hang-up",
        }
    }

    fn into_event(self) -> ServerEvent {
        let from = self.from;
        match self.payload {
            SignalPayload::Typing(is_typing) => ServerEvent::UserTyping { user_id: from, is_typing },
            SignalPayload::Offer(offer) => ServerEvent::IncomingCall { from, offer },
            SignalPayload::Answer(answer) => ServerEvent::CallAnswered { from, answer },
            SignalPayload::IceCandidate(candidate) => ServerEvent::IceCandidate { from, candidate },
            SignalPayload::HangUp => ServerEvent::CallEnded { from },
        }
    }
}

/// Stateless forwarding of typing, read and call signals to whoever is
/// online. An offline target is not an error: the signal is dropped.
#[derive(Clone)]
pub struct SignalRelay {
    presence: PresenceRegistry,
    store: Arc<dyn MessageStore>,
}

impl SignalRelay {
    pub fn new(presence: PresenceRegistry, store: Arc<dyn MessageStore>) -> Self {
        Self { presence, store }
    }

    /// Returns true if the target was online and the event was queued.
    pub async fn relay(&self, envelope: SignalEnvelope) -> bool {
        let Some(handle) = self.presence.lookup(envelope.to).await else {
            trace!("{} {} -> {} dropped, target offline", envelope.kind(), envelope.from, envelope.to);
            return false;
        };

        match envelope.payload {
            SignalPayload::Typing(_) => trace!("{} typing -> {}", envelope.from, envelope.to),
            _ => info!("{} -> call {} to {}", envelope.from, envelope.kind(), envelope.to),
        }

        handle.send(envelope.into_event())
    }

    /// Mark a message read and tell its sender, once, if they are online.
    ///
    /// Unknown ids and messages addressed to someone else resolve to
    /// `Ok(None)` with no event. A storage failure is reported to the reader
    /// as `message-error`.
    pub async fn mark_read(&self, reader: &Session, message_id: Uuid) -> Result<Option<ReadReceipt>, RelayError> {
        let store = self.store.clone();
        let reader_id = reader.user_id();
        let result = tokio::task::spawn_blocking(move || store.mark_message_read(message_id, reader_id))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|r| r);

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                error!("{} failed to mark {} read: {:?}", reader_id, message_id, e);
                let err = RelayError::ReadReceipt(e);
                reader.emit(ServerEvent::MessageError { error: err.to_string() });
                return Err(err);
            }
        };

        if let Some(receipt) = receipt.as_ref().filter(|r| r.newly_read) {
            if let Some(handle) = self.presence.lookup(receipt.sender_id).await {
                handle.send(ServerEvent::MessageRead { message_id });
            }
        }

        Ok(receipt)
    }
}
