use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of an authenticated user. Zero is never a valid user.
pub type UserId = i64;

/// Durable row identifier handed out by the message store
pub type MessageId = i64;

/// A persisted direct message joined with both usernames.
///
/// Field names follow the browser client's expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    #[serde(rename = "FirstUser")]
    pub sender_id: UserId,
    #[serde(rename = "SecondUser")]
    pub receiver_id: UserId,
    #[serde(rename = "message")]
    pub body: String,
    #[serde(rename = "Sender")]
    pub sender_name: String,
    #[serde(rename = "Receiver")]
    pub receiver_name: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Most recent message of a conversation
#[derive(Debug, Clone, PartialEq)]
pub struct LastMessage {
    pub sender_id: UserId,
    pub body: String,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&ChatMessage> for LastMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            sender_id: message.sender_id,
            body: message.body.clone(),
            sender_name: message.sender_name.clone(),
            created_at: message.created_at,
        }
    }
}

/// Directory entry for a known user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "UserID")]
    pub id: UserId,
    pub username: String,
}

impl UserSummary {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}
