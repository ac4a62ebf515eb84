//! Seams to the persistence and notification collaborators.
//!
//! Both are synchronous; the relays call them through `spawn_blocking` so a
//! slow write never stalls other connections.

use uuid::Uuid;

use fitlink_db::Database;
use fitlink_types::models::{DirectMessage, NewDirectMessage, NewNotification, ReadReceipt};

pub trait MessageStore: Send + Sync + 'static {
    fn create_message(&self, new: &NewDirectMessage) -> anyhow::Result<DirectMessage>;

    /// `None` when no message with that id is addressed to `reader_id`.
    fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> anyhow::Result<Option<ReadReceipt>>;
}

pub trait NotificationSink: Send + Sync + 'static {
    fn enqueue(&self, notification: &NewNotification) -> anyhow::Result<()>;
}

impl MessageStore for Database {
    fn create_message(&self, new: &NewDirectMessage) -> anyhow::Result<DirectMessage> {
        self.insert_direct_message(new)
    }

    fn mark_message_read(&self, message_id: Uuid, reader_id: Uuid) -> anyhow::Result<Option<ReadReceipt>> {
        Database::mark_message_read(self, message_id, reader_id)
    }
}

impl NotificationSink for Database {
    fn enqueue(&self, notification: &NewNotification) -> anyhow::Result<()> {
        self.insert_notification(notification)?;
        Ok(())
    }
}
