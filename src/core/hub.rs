//! Chat hub: registry, collaborators and presence fan-out

use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};
use warp::ws::Message as WsMessage;

use crate::core::connection::Connection;
use crate::core::message::UserId;
use crate::core::message_types::ServerFrame;
use crate::core::presence::build_presence;
use crate::core::registry::{ConnectionRegistry, SharedRegistry};
use crate::storage::{MessageStore, UserDirectory};

/// Owns the registry and the collaborators every connection shares
pub struct ChatHub {
    registry: SharedRegistry,
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    // Serializes presence broadcasts so they go out in triggering order
    broadcast_lock: Mutex<()>,
}

impl ChatHub {
    pub fn new(store: Arc<dyn MessageStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            store,
            directory,
            broadcast_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn MessageStore {
        self.store.as_ref()
    }

    /// Register a user's new connection and announce it.
    ///
    /// A previous connection for the same user is evicted from the registry
    /// but left open.
    pub async fn connect(&self, user_id: UserId, sender: mpsc::UnboundedSender<WsMessage>) -> Connection {
        let connection = Connection::new(user_id, sender);
        if let Some(evicted) = self.registry.register(connection.clone()) {
            info!(
                "User {} replaced connection {} with {}",
                user_id, evicted.id, connection.id
            );
        }
        info!(
            "User {} connected ({}), {} online",
            user_id,
            connection.id,
            self.registry.client_count()
        );

        self.broadcast_presence().await;
        connection
    }

    /// Unregister a connection and announce the change.
    ///
    /// Returns false when the connection had already been evicted, in which
    /// case nobody's view changed and nothing is broadcast.
    pub async fn disconnect(&self, connection: &Connection) -> bool {
        let removed = self.registry.unregister(connection.user_id, connection.id);
        if removed {
            info!(
                "User {} disconnected ({}) after {:?}, {} online",
                connection.user_id,
                connection.id,
                connection.connection_duration(),
                self.registry.client_count()
            );
            self.broadcast_presence().await;
        } else {
            debug!(
                "Connection {} for user {} was already evicted",
                connection.id, connection.user_id
            );
        }
        removed
    }

    /// Recompute and push the presence view to every registered connection.
    ///
    /// A peer whose write fails is unregistered and the broadcast carries on
    /// to the rest. Returns the number of peers that received a frame.
    pub async fn broadcast_presence(&self) -> usize {
        let _guard = self.broadcast_lock.lock().await;

        let users = match self.directory.list_all().await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to list users for presence broadcast: {}", e);
                return 0;
            }
        };

        for user_id in self.registry.prune_closed() {
            debug!("Pruned closed connection for user {}", user_id);
        }
        let peers = self.registry.snapshot();
        let online: HashSet<UserId> = peers.iter().map(|c| c.user_id).collect();
        let mut delivered = 0;

        for peer in peers {
            let records = match build_presence(peer.user_id, &users, self.store.as_ref(), &online).await {
                Ok(records) => records,
                Err(e) => {
                    error!("Failed to build presence for user {}: {}", peer.user_id, e);
                    continue;
                }
            };

            match peer.send_frame(&ServerFrame::Presence { users: records }) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("Dropping user {} after failed presence write: {}", peer.user_id, e);
                    self.registry.unregister(peer.user_id, peer.id);
                }
            }
        }

        debug!("Presence broadcast delivered to {} connections", delivered);
        delivered
    }
}

pub type SharedHub = Arc<ChatHub>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::UserSummary;
    use crate::core::presence::PresenceStatus;
    use crate::storage::MemoryStore;

    fn hub() -> ChatHub {
        let store = Arc::new(MemoryStore::with_users([
            UserSummary::new(7, "grace"),
            UserSummary::new(9, "ivan"),
            UserSummary::new(11, "kate"),
        ]));
        ChatHub::new(store.clone(), store)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Ok(text) = msg.to_str() {
                frames.push(serde_json::from_str(text).unwrap());
            }
        }
        frames
    }

    #[tokio::test]
    async fn test_disconnect_rebroadcasts_offline_status() {
        let hub = hub();
        let (tx7, _rx7) = mpsc::unbounded_channel();
        let (tx9, mut rx9) = mpsc::unbounded_channel();

        let conn7 = hub.connect(7, tx7).await;
        hub.connect(9, tx9).await;
        drain(&mut rx9);

        assert!(hub.disconnect(&conn7).await);

        let frames = drain(&mut rx9);
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            ServerFrame::Presence { users } => {
                let grace = users.iter().find(|u| u.user_id == 7).unwrap();
                assert_eq!(grace.status, PresenceStatus::Offline);
                assert!(users.iter().all(|u| u.user_id != 9));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_peer_is_dropped_but_others_served() {
        let hub = hub();
        let (tx7, rx7) = mpsc::unbounded_channel();
        let (tx9, mut rx9) = mpsc::unbounded_channel();
        hub.connect(7, tx7).await;
        hub.connect(9, tx9).await;
        drain(&mut rx9);

        drop(rx7);
        let delivered = hub.broadcast_presence().await;

        assert_eq!(delivered, 1);
        assert!(!hub.registry().is_online(7));
        assert_eq!(drain(&mut rx9).len(), 1);
    }

    #[tokio::test]
    async fn test_evicted_connection_disconnect_is_silent() {
        let hub = hub();
        let (tx_old, _rx_old) = mpsc::unbounded_channel();
        let (tx_new, mut rx_new) = mpsc::unbounded_channel();

        let old = hub.connect(7, tx_old).await;
        let new = hub.connect(7, tx_new).await;
        drain(&mut rx_new);

        assert!(!hub.disconnect(&old).await);
        assert!(drain(&mut rx_new).is_empty());
        assert_eq!(hub.registry().get(7).unwrap().id, new.id);
    }

    #[tokio::test]
    async fn test_broadcast_reflects_messages_and_status() {
        let store = Arc::new(MemoryStore::with_users([
            UserSummary::new(7, "grace"),
            UserSummary::new(9, "ivan"),
            UserSummary::new(11, "kate"),
        ]));
        let hub = ChatHub::new(store.clone(), store.clone());
        let (tx9, mut rx9) = mpsc::unbounded_channel();
        let (tx11, _rx11) = mpsc::unbounded_channel();
        hub.connect(9, tx9).await;
        hub.connect(11, tx11).await;
        store.insert(9, 11, "hello").await.unwrap();
        drain(&mut rx9);

        assert_eq!(hub.broadcast_presence().await, 2);
        let users = match drain(&mut rx9).pop() {
            Some(ServerFrame::Presence { users }) => users,
            other => panic!("unexpected frame {:?}", other),
        };
        let order: Vec<UserId> = users.iter().map(|r| r.user_id).collect();
        assert_eq!(order, vec![11, 7]);
        assert_eq!(users[0].status, PresenceStatus::Online);
        assert_eq!(users[0].last_message, "hello");
        assert_eq!(users[1].status, PresenceStatus::Offline);
    }
}
