use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use fitlink_types::events::ServerEvent;

use crate::notifier;

pub type ConnectionId = Uuid;

/// Outbound side of one live connection.
///
/// Events pushed here are written to the socket, in order, by that
/// connection's writer task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn_id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// New handle with a fresh connection id, plus the receiver its writer drains.
    pub fn open() -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Queue an event. Returns false when the connection is already gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Process-wide map of user id to that user's live connection.
///
/// The write lock is never held across an await. Besides the map change,
/// the only work done under it is queuing presence events, so peers see
/// transitions in registry order.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    entries: Arc<RwLock<HashMap<Uuid, ConnectionHandle>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` the user's live connection.
    ///
    /// Last register wins: an existing entry for the user (another tab, a
    /// reconnect that beat the old disconnect) is replaced and returned.
    /// There is no multi-device fan-out.
    pub async fn register(&self, user_id: Uuid, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.entries.write().await.insert(user_id, handle)
    }

    /// Online transition: register `handle` and tell everyone about it in
    /// one step under the write lock.
    ///
    /// The new connection first gets an `online-users` snapshot of everyone
    /// else, then every other connection gets `user-online`. Returns the
    /// replaced entry, if any.
    pub async fn join(&self, user_id: Uuid, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let mut entries = self.entries.write().await;
        let user_ids = entries.keys().copied().filter(|uid| *uid != user_id).collect();
        handle.send(ServerEvent::OnlineUsers { user_ids });
        let previous = entries.insert(user_id, handle);
        notifier::announce_online(&entries, user_id);
        previous
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.entries.read().await.get(&user_id).cloned()
    }

    /// Remove the user's entry. Calling it for an absent user is a no-op.
    pub async fn unregister(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.entries.write().await.remove(&user_id)
    }

    /// Remove the user's entry only if it still belongs to `conn_id`.
    ///
    /// A superseded connection closing late cannot evict the newer one.
    /// Returns true if an entry was removed.
    pub async fn release(&self, user_id: Uuid, conn_id: ConnectionId) -> bool {
        remove_owned(&mut *self.entries.write().await, user_id, conn_id)
    }

    /// Offline transition: `release`, plus `user-offline` to everyone left,
    /// under the same write lock. A no-op when `conn_id` no longer owns the
    /// entry, so it broadcasts at most once per registration.
    pub async fn leave(&self, user_id: Uuid, conn_id: ConnectionId) -> bool {
        let mut entries = self.entries.write().await;
        if !remove_owned(&mut *entries, user_id, conn_id) {
            return false;
        }
        notifier::announce_offline(&entries, user_id);
        true
    }

    pub async fn list_online(&self) -> HashSet<Uuid> {
        self.entries.read().await.keys().copied().collect()
    }
}

fn remove_owned(entries: &mut HashMap<Uuid, ConnectionHandle>, user_id: Uuid, conn_id: ConnectionId) -> bool {
    match entries.get(&user_id) {
        Some(handle) if handle.conn_id == conn_id => {
            entries.remove(&user_id);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_finds_registered_connection() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (handle, _rx) = ConnectionHandle::open();

        assert!(registry.register(user, handle.clone()).await.is_none());
        assert_eq!(registry.lookup(user).await.map(|h| h.conn_id()), Some(handle.conn_id()));
        assert!(registry.lookup(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn last_register_wins() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = ConnectionHandle::open();
        let (second, _rx2) = ConnectionHandle::open();

        registry.register(user, first.clone()).await;
        let replaced = registry.register(user, second.clone()).await;

        assert_eq!(replaced.map(|h| h.conn_id()), Some(first.conn_id()));
        assert_eq!(registry.lookup(user).await.map(|h| h.conn_id()), Some(second.conn_id()));
        assert_eq!(registry.list_online().await.len(), 1);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (handle, _rx) = ConnectionHandle::open();

        registry.register(user, handle).await;
        assert!(registry.unregister(user).await.is_some());
        assert!(registry.unregister(user).await.is_none());
        assert!(registry.lookup(user).await.is_none());
    }

    #[tokio::test]
    async fn register_unregister_sequence_keeps_only_latest_live_entry() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let mut handles = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (h, rx) = ConnectionHandle::open();
            handles.push(h);
            receivers.push(rx);
        }

        registry.register(user, handles[0].clone()).await;
        registry.unregister(user).await;
        registry.register(user, handles[1].clone()).await;
        registry.register(user, handles[2].clone()).await;
        registry.unregister(user).await;
        registry.unregister(user).await;
        assert!(registry.lookup(user).await.is_none());

        registry.register(user, handles[1].clone()).await;
        assert_eq!(registry.lookup(user).await.map(|h| h.conn_id()), Some(handles[1].conn_id()));
    }

    #[tokio::test]
    async fn release_ignores_superseded_connection() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let (old, _rx1) = ConnectionHandle::open();
        let (new, _rx2) = ConnectionHandle::open();

        registry.register(user, old.clone()).await;
        registry.register(user, new.clone()).await;

        assert!(!registry.release(user, old.conn_id()).await);
        assert_eq!(registry.lookup(user).await.map(|h| h.conn_id()), Some(new.conn_id()));

        assert!(registry.release(user, new.conn_id()).await);
        assert!(!registry.release(user, new.conn_id()).await);
        assert!(registry.lookup(user).await.is_none());
    }

    #[tokio::test]
    async fn list_online_is_a_snapshot_of_all_entries() {
        let registry = PresenceRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (ha, _rxa) = ConnectionHandle::open();
        let (hb, _rxb) = ConnectionHandle::open();
        registry.register(a, ha).await;
        registry.register(b, hb).await;

        let snapshot = registry.list_online().await;
        registry.unregister(a).await;

        assert_eq!(snapshot, HashSet::from([a, b]));
        assert_eq!(registry.list_online().await, HashSet::from([b]));
    }

    #[tokio::test]
    async fn concurrent_registrations_are_all_visible() {
        let registry = PresenceRegistry::new();
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let user = Uuid::new_v4();
                let (handle, rx) = ConnectionHandle::open();
                registry.register(user, handle).await;
                (user, rx)
            }));
        }

        let mut users = HashSet::new();
        let mut receivers = Vec::new();
        for task in tasks {
            let (user, rx) = task.await.unwrap();
            users.insert(user);
            receivers.push(rx);
        }

        assert_eq!(registry.list_online().await, users);
    }

    #[tokio::test]
    async fn join_queues_snapshot_before_entry_is_visible() {
        let registry = PresenceRegistry::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (ha, mut rxa) = ConnectionHandle::open();
        let (hb, mut rxb) = ConnectionHandle::open();
        registry.register(a, ha).await;

        assert!(registry.join(b, hb).await.is_none());
        registry.lookup(b).await.unwrap().send(ServerEvent::UserTyping { user_id: a, is_typing: true });

        assert_eq!(rxb.try_recv().unwrap(), ServerEvent::OnlineUsers { user_ids: vec![a] });
        assert!(matches!(rxb.try_recv().unwrap(), ServerEvent::UserTyping { .. }));
        assert_eq!(rxa.try_recv().unwrap(), ServerEvent::UserOnline { user_id: b });
    }

    #[tokio::test]
    async fn leave_announces_only_for_the_owning_connection() {
        let registry = PresenceRegistry::new();
        let (a, peer) = (Uuid::new_v4(), Uuid::new_v4());
        let (hp, mut rxp) = ConnectionHandle::open();
        let (old, _rx1) = ConnectionHandle::open();
        let (new, _rx2) = ConnectionHandle::open();
        registry.register(peer, hp).await;
        registry.register(a, old.clone()).await;
        registry.register(a, new.clone()).await;

        assert!(!registry.leave(a, old.conn_id()).await);
        assert!(rxp.try_recv().is_err());

        assert!(registry.leave(a, new.conn_id()).await);
        assert!(!registry.leave(a, new.conn_id()).await);
        assert_eq!(rxp.try_recv().unwrap(), ServerEvent::UserOffline { user_id: a });
        assert!(rxp.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_reports_closed_connection() {
        let (handle, rx) = ConnectionHandle::open();
        assert!(handle.send(ServerEvent::UserOnline { user_id: Uuid::new_v4() }));
        drop(rx);
        assert!(!handle.send(ServerEvent::UserOnline { user_id: Uuid::new_v4() }));
    }
}
