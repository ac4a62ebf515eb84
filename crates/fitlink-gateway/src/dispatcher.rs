use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use fitlink_types::api::Role;
use fitlink_types::events::{ClientEvent, ServerEvent};

use crate::auth::Identity;
use crate::presence::{ConnectionHandle, ConnectionId, PresenceRegistry};
use crate::relay::{MessageRelay, OutgoingMessage};
use crate::signal::{SignalEnvelope, SignalPayload, SignalRelay};
use crate::store::{MessageStore, NotificationSink};

/// One authenticated, registered connection.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    handle: ConnectionHandle,
}

impl Session {
    pub fn new(identity: Identity, handle: ConnectionHandle) -> Self {
        Self { identity, handle }
    }

    pub fn user_id(&self) -> Uuid {
        self.identity.user_id
    }

    pub fn role(&self) -> Role {
        self.identity.role
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.handle.conn_id()
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Queue an event for this connection only.
    pub fn emit(&self, event: ServerEvent) -> bool {
        self.handle.send(event)
    }
}

/// What the connection loop should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Server sends a Ping this often; two missed Pongs drop the connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const SEND_MESSAGE: &str = "send-message";

/// Owns the presence registry and routes every inbound event.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
    heartbeat: Duration,
}

struct DispatcherInner {
    presence: PresenceRegistry,
    messages: MessageRelay,
    signals: SignalRelay,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn MessageStore>, notifications: Arc<dyn NotificationSink>) -> Self {
        let presence = PresenceRegistry::new();
        Self {
            inner: Arc::new(DispatcherInner {
                messages: MessageRelay::new(presence.clone(), store.clone(), notifications),
                signals: SignalRelay::new(presence.clone(), store),
                presence,
            }),
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    /// Same dispatcher, with connections pinging every `interval`.
    pub fn with_heartbeat(self, interval: Duration) -> Self {
        Self {
            heartbeat: interval,
            ..self
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.inner.presence
    }

    pub fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    /// Authenticated -> Online.
    ///
    /// Registers the connection (replacing any older one for the same user),
    /// sends it the list of who else is online and announces it to everyone
    /// else. Returns the session and the receiver its writer must drain.
    pub async fn connect(&self, identity: Identity) -> (Session, mpsc::UnboundedReceiver<ServerEvent>) {
        let (handle, rx) = ConnectionHandle::open();
        let session = Session::new(identity, handle.clone());

        if let Some(previous) = self.inner.presence.join(identity.user_id, handle).await {
            info!(
                "{} reconnected, connection {} replaces {}",
                identity.user_id,
                session.conn_id(),
                previous.conn_id()
            );
        }

        (session, rx)
    }

    /// Online -> Disconnected.
    ///
    /// Safe to call more than once. Only the connection that still owns the
    /// presence entry triggers `user-offline`; returns whether it did.
    pub async fn disconnect(&self, session: &Session) -> bool {
        self.inner.presence.leave(session.user_id(), session.conn_id()).await
    }

    /// Decode one text frame and route it.
    ///
    /// Undecodable frames are logged and dropped, except a `send-message`
    /// whose payload is bad, which is answered with `message-error`.
    pub async fn handle_frame(&self, session: &Session, text: &str) -> Flow {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(session, event).await,
            Err(e) => {
                warn!("{} bad event: {} -- raw: {}", session.user_id(), e, truncate(text, 200));
                if frame_name(text).as_deref() == Some(SEND_MESSAGE) {
                    session.emit(ServerEvent::MessageError {
                        error: format!("Invalid message: {}", e),
                    });
                }
                Flow::Continue
            }
        }
    }

    /// Route one inbound event to its handler.
    pub async fn handle(&self, session: &Session, event: ClientEvent) -> Flow {
        let from = session.user_id();

        match event {
            ClientEvent::SendMessage {
                receiver_id,
                content,
                media_url,
                media_type,
            } => {
                // Outcome already reported to the sender.
                let _ = self
                    .inner
                    .messages
                    .send(
                        session,
                        OutgoingMessage {
                            receiver_id,
                            content,
                            media_url,
                            media_type,
                        },
                    )
                    .await;
            }

            ClientEvent::Typing { receiver_id } => {
                self.signal(from, receiver_id, SignalPayload::Typing(true)).await;
            }

            ClientEvent::StopTyping { receiver_id } => {
                self.signal(from, receiver_id, SignalPayload::Typing(false)).await;
            }

            ClientEvent::MarkAsRead { message_id } => {
                let _ = self.inner.signals.mark_read(session, message_id).await;
            }

            ClientEvent::CallUser { to, offer } => {
                self.signal(from, to, SignalPayload::Offer(offer)).await;
            }

            ClientEvent::AnswerCall { to, answer } => {
                self.signal(from, to, SignalPayload::Answer(answer)).await;
            }

            ClientEvent::IceCandidate { to, candidate } => {
                self.signal(from, to, SignalPayload::IceCandidate(candidate)).await;
            }

            ClientEvent::EndCall { to } => {
                self.signal(from, to, SignalPayload::HangUp).await;
            }

            ClientEvent::Logout => {
                info!("{} logged out", from);
                return Flow::Close;
            }
        }

        Flow::Continue
    }

    async fn signal(&self, from: Uuid, to: Uuid, payload: SignalPayload) {
        self.inner
            .signals
            .relay(SignalEnvelope::new(from, to, payload))
            .await;
    }
}

/// The `event` tag of a frame whose payload failed to decode.
fn frame_name(text: &str) -> Option<String> {
    let frame: Value = serde_json::from_str(text).ok()?;
    frame.get("event")?.as_str().map(str::to_owned)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
