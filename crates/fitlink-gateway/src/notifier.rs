//! Presence fan-out.
//!
//! These run while the registry's write lock is held, so announcements
//! reach every peer in the same order as the registry changes they describe.
//! Queuing is a non-blocking channel send; nothing here awaits.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use fitlink_types::events::ServerEvent;

use crate::presence::ConnectionHandle;

pub fn announce_online(entries: &HashMap<Uuid, ConnectionHandle>, user_id: Uuid) -> usize {
    announce(entries, user_id, ServerEvent::UserOnline { user_id })
}

pub fn announce_offline(entries: &HashMap<Uuid, ConnectionHandle>, user_id: Uuid) -> usize {
    announce(entries, user_id, ServerEvent::UserOffline { user_id })
}

/// Best effort per recipient: a closed connection is skipped and the
/// rest still get the event. Returns how many connections accepted it.
fn announce(entries: &HashMap<Uuid, ConnectionHandle>, user_id: Uuid, event: ServerEvent) -> usize {
    let mut delivered = 0;
    for (uid, handle) in entries.iter().filter(|(uid, _)| **uid != user_id) {
        if handle.send(event.clone()) {
            delivered += 1;
        } else {
            debug!("presence update for {} not delivered to {}", user_id, uid);
        }
    }

    delivered
}
