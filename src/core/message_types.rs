//! Wire frames exchanged over a chat connection

use serde::{Deserialize, Serialize};

use crate::core::message::{ChatMessage, UserId};
use crate::core::presence::PresenceRecord;
use crate::error::{ParlorError, Result};

/// Client-to-server frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Fetch the whole conversation with another user
    GetMessages {
        #[serde(rename = "secondUser", alias = "SecondUser", default)]
        second_user: UserId,
    },

    /// Send a direct message
    SendMessage {
        #[serde(rename = "secondUser", alias = "SecondUser", default)]
        second_user: UserId,
        #[serde(default)]
        message: String,
    },

    /// Ask for a fresh presence broadcast
    #[serde(rename = "loadUsers")]
    LoadUsers,

    /// Typing indicator for the open conversation
    Typing {
        #[serde(rename = "secondUser", alias = "SecondUser", default)]
        second_user: UserId,
        #[serde(rename = "isTyping", default)]
        is_typing: bool,
    },

    /// Close this connection and go offline
    Logout,
}

impl ClientFrame {
    /// Decode a text frame. Unknown `type` tags are rejected here.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ParlorError::MessageParseError(e.to_string()))
    }
}

/// Server-to-client frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Conversation history, ascending by timestamp
    #[serde(rename = "getMessages")]
    Conversation {
        #[serde(rename = "Sender")]
        sender: UserId,
        #[serde(rename = "Receiver")]
        receiver: UserId,
        messages: Vec<ChatMessage>,
    },

    /// A committed message, sent identically to author and addressee
    #[serde(rename = "SendMessage")]
    Delivered {
        #[serde(rename = "Sender")]
        sender: UserId,
        #[serde(rename = "Receiver")]
        receiver: UserId,
        messages: ChatMessage,
    },

    /// The addressee has no live connection; the message was still stored
    #[serde(rename = "Offline")]
    Offline {
        #[serde(rename = "Sender")]
        sender: UserId,
        #[serde(rename = "Receiver")]
        receiver: UserId,
    },

    #[serde(rename = "loadUsersResponse")]
    Presence { users: Vec<PresenceRecord> },

    #[serde(rename = "Typing")]
    Typing {
        #[serde(rename = "Sender")]
        sender: UserId,
        #[serde(rename = "Receiver")]
        receiver: UserId,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },

    /// A single operation failed; the connection stays open
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerFrame {
    pub fn error(err: &ParlorError) -> Self {
        ServerFrame::Error {
            message: err.to_string(),
        }
    }

    /// Single encode path for every outbound frame
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ParlorError::MessageParseError(e.to_string()))
    }
}
