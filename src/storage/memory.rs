//! In-memory storage implementation for development and testing
//!
//! Keeps users and messages in memory. Row identifiers and timestamps are
//! strictly increasing so conversation order matches insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{MessageStore, UserDirectory};
use crate::core::message::{ChatMessage, LastMessage, MessageId, UserId, UserSummary};
use crate::error::{ParlorError, Result};

#[derive(Debug, Clone)]
struct MessageRow {
    id: MessageId,
    sender_id: UserId,
    receiver_id: UserId,
    body: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, String>,
    messages: Vec<MessageRow>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Inner {
    fn username(&self, id: UserId) -> Result<String> {
        self.users.get(&id).cloned().ok_or(ParlorError::UnknownUser(id))
    }

    fn join(&self, row: &MessageRow) -> Result<ChatMessage> {
        Ok(ChatMessage {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            body: row.body.clone(),
            sender_name: self.username(row.sender_id)?,
            receiver_name: self.username(row.receiver_id)?,
            created_at: row.created_at,
        })
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_timestamp {
            Some(last) if now <= last => last + ChronoDuration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(stamp);
        stamp
    }
}

/// In-memory message store and user directory
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create a store pre-populated with users
    pub fn with_users(users: impl IntoIterator<Item = UserSummary>) -> Self {
        let inner = Inner {
            users: users.into_iter().map(|u| (u.id, u.username)).collect(),
            ..Inner::default()
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub async fn add_user(&self, id: UserId, username: impl Into<String>) {
        self.inner.write().await.users.insert(id, username.into());
    }

    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert(&self, sender_id: UserId, receiver_id: UserId, body: &str) -> Result<MessageId> {
        let mut inner = self.inner.write().await;
        // Same outcome as a foreign key failure on a real backend
        inner.username(sender_id)?;
        inner.username(receiver_id)?;

        let id = inner.messages.len() as MessageId + 1;
        let created_at = inner.next_timestamp();
        inner.messages.push(MessageRow {
            id,
            sender_id,
            receiver_id,
            body: body.to_string(),
            created_at,
        });
        Ok(id)
    }

    async fn get_by_id(&self, id: MessageId) -> Result<ChatMessage> {
        let inner = self.inner.read().await;
        let row = inner
            .messages
            .iter()
            .find(|row| row.id == id)
            .ok_or_else(|| ParlorError::StorageError(format!("message {} not found", id)))?;
        inner.join(row)
    }

    async fn last_between(&self, a: UserId, b: UserId) -> Result<Option<LastMessage>> {
        let inner = self.inner.read().await;
        let last = inner
            .messages
            .iter()
            .filter(|row| {
                (row.sender_id == a && row.receiver_id == b) || (row.sender_id == b && row.receiver_id == a)
            })
            .max_by_key(|row| (row.created_at, row.id));

        match last {
            Some(row) => Ok(Some(LastMessage::from(&inner.join(row)?))),
            None => Ok(None),
        }
    }

    async fn conversation(&self, a: UserId, b: UserId) -> Result<Vec<ChatMessage>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&MessageRow> = inner
            .messages
            .iter()
            .filter(|row| {
                (row.sender_id == a && row.receiver_id == b) || (row.sender_id == b && row.receiver_id == a)
            })
            .collect();
        rows.sort_by_key(|row| (row.created_at, row.id));
        rows.into_iter().map(|row| inner.join(row)).collect()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn list_all(&self) -> Result<Vec<UserSummary>> {
        let inner = self.inner.read().await;
        let mut users: Vec<UserSummary> = inner
            .users
            .iter()
            .map(|(id, name)| UserSummary::new(*id, name.clone()))
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

pub type SharedMemoryStore = Arc<MemoryStore>;
