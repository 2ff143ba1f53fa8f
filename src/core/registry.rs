//! Live mapping of user identity to connection
//!
//! One lock guards the map. Every access holds it only for the map
//! operation itself; frames are written after the guard is released.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use uuid::Uuid;

use crate::core::connection::Connection;
use crate::core::message::UserId;

pub struct ConnectionRegistry {
    connections: Mutex<HashMap<UserId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Connection>> {
        self.connections.lock().unwrap_or_else(|poisoned| {
            warn!("Connection registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register a connection, returning the one it evicted for the same user
    pub fn register(&self, connection: Connection) -> Option<Connection> {
        let user_id = connection.user_id;
        let evicted = self.lock().insert(user_id, connection);
        if let Some(old) = &evicted {
            debug!("User {} reconnected, evicting connection {}", user_id, old.id);
        }
        evicted
    }

    /// Remove the entry for `user_id` only if it is still `connection_id`.
    ///
    /// A connection evicted by a newer one must not unregister its successor.
    pub fn unregister(&self, user_id: UserId, connection_id: Uuid) -> bool {
        let mut connections = self.lock();
        match connections.get(&user_id) {
            Some(current) if current.id == connection_id => {
                connections.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, user_id: UserId) -> Option<Connection> {
        self.lock().get(&user_id).cloned()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.lock().contains_key(&user_id)
    }

    pub fn online_users(&self) -> HashSet<UserId> {
        self.lock().keys().copied().collect()
    }

    /// Copy of every registered connection, for fan-out outside the lock
    pub fn snapshot(&self) -> Vec<Connection> {
        self.lock().values().cloned().collect()
    }

    /// Drop entries whose socket writer has already gone away
    pub fn prune_closed(&self) -> Vec<UserId> {
        let mut connections = self.lock();
        let closed: Vec<UserId> = connections
            .iter()
            .filter(|(_, conn)| conn.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for id in &closed {
            connections.remove(id);
        }
        closed
    }

    pub fn client_count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedRegistry = Arc<ConnectionRegistry>;
