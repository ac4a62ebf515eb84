//! Test doubles for the storage seams.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::bail;
use tokio::sync::mpsc;
use uuid::Uuid;

use fitlink_types::api::Role;
use fitlink_types::events::ServerEvent;
use fitlink_types::models::{DirectMessage, NewDirectMessage, NewNotification, ReadReceipt};

use crate::auth::Identity;
use crate::dispatcher::Session;
use crate::presence::ConnectionHandle;
use crate::store::{MessageStore, NotificationSink};

/// Storage that is always down.
pub struct FailingStore;

impl MessageStore for FailingStore {
    fn create_message(&self, _new: &NewDirectMessage) -> anyhow::Result<DirectMessage> {
        bail!("database is locked")
    }

    fn mark_message_read(&self, _message_id: Uuid, _reader_id: Uuid) -> anyhow::Result<Option<ReadReceipt>> {
        bail!("database is locked")
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notes: Mutex<Vec<NewNotification>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Vec<NewNotification> {
        self.notes.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn enqueue(&self, notification: &NewNotification) -> anyhow::Result<()> {
        if self.fail {
            bail!("notification queue unavailable");
        }
        self.notes.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Unregistered session for a fresh user.
pub fn session() -> (Session, mpsc::UnboundedReceiver<ServerEvent>) {
    let (handle, rx) = ConnectionHandle::open();
    let identity = Identity {
        user_id: Uuid::new_v4(),
        role: Role::User,
    };
    (Session::new(identity, handle), rx)
}

/// Notifications are enqueued off the send path; poll until they land.
pub async fn wait_for_notifications(sink: &RecordingSink, count: usize) -> Vec<NewNotification> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let notes = sink.recorded();
            if notes.len() >= count {
                return notes;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("notification was not enqueued in time")
}
