//! Collaborator contracts the hub depends on
//!
//! The hub never owns storage; it reads and writes through these traits so a
//! SQL backend can be plugged in without touching the core.

use async_trait::async_trait;

use crate::core::message::{ChatMessage, LastMessage, MessageId, UserId, UserSummary};
use crate::error::Result;

/// Message storage interface
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message and return its durable row identifier
    async fn insert(&self, sender_id: UserId, receiver_id: UserId, body: &str) -> Result<MessageId>;

    /// Read back a committed row joined with both usernames
    async fn get_by_id(&self, id: MessageId) -> Result<ChatMessage>;

    /// Most recent message between two users, in either direction
    async fn last_between(&self, a: UserId, b: UserId) -> Result<Option<LastMessage>>;

    /// Every message between two users, ascending by timestamp
    async fn conversation(&self, a: UserId, b: UserId) -> Result<Vec<ChatMessage>>;
}

/// User directory interface
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All known users, ascending by username
    async fn list_all(&self) -> Result<Vec<UserSummary>>;
}
