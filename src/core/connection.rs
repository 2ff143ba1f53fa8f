//! WebSocket connection handles and lifecycle states

use std::fmt;
use std::time::{Duration, Instant};

use log::warn;
use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::Message;

use crate::core::message::UserId;
use crate::core::message_types::ServerFrame;
use crate::error::{ParlorError, Result};

/// Lifecycle of a single connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Registered,
    Serving,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Move to `next`, refusing transitions the lifecycle does not allow
    pub fn advance(self, next: ConnectionState) -> Result<ConnectionState> {
        use ConnectionState::*;
        let allowed = matches!(
            (self, next),
            (Connecting, Registered)
                | (Connecting, Closed)
                | (Registered, Serving)
                | (Registered, Closing)
                | (Serving, Closing)
                | (Closing, Closed)
        );
        if allowed {
            Ok(next)
        } else {
            Err(ParlorError::ConnectionError(format!(
                "illegal transition {:?} -> {:?}",
                self, next
            )))
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Handle to one live duplex channel bound to a single user.
///
/// Cloning shares the outbound channel; the socket itself stays with the
/// task that accepted it.
#[derive(Clone)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: UserId,
    sender: mpsc::UnboundedSender<Message>,
    pub connected_at: Instant,
}

impl Connection {
    pub fn new(user_id: UserId, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            sender,
            connected_at: Instant::now(),
        }
    }

    /// Encode and queue a frame for this connection
    pub fn send_frame(&self, frame: &ServerFrame) -> Result<()> {
        let text = frame.to_text()?;
        self.send(Message::text(text))
    }

    /// Queue a raw websocket message (ping, close)
    pub fn send(&self, message: Message) -> Result<()> {
        self.sender.send(message).map_err(|_| {
            warn!("Failed to send to user {} on connection {}", self.user_id, self.id);
            ParlorError::ConnectionClosed
        })
    }

    /// Ask the writer to close the socket
    pub fn close(&self) {
        let _ = self.sender.send(Message::close());
    }

    /// True once the socket writer has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
