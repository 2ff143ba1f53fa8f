//! Dispatches inbound client frames to the router or the presence hub

use log::{debug, error, warn};

use crate::constants::DEFAULT_MAX_FRAME_BYTES;
use crate::core::connection::Connection;
use crate::core::hub::SharedHub;
use crate::core::message_types::{ClientFrame, ServerFrame};
use crate::core::router::{Delivery, MessageRouter};
use crate::error::{ParlorError, Result};

/// What the serve loop should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Close,
}

/// Handles incoming client frames for one hub
pub struct MessageHandler {
    hub: SharedHub,
    router: MessageRouter,
    max_frame_bytes: usize,
}

impl MessageHandler {
    pub fn new(hub: SharedHub) -> Self {
        Self::with_frame_limit(hub, DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_frame_limit(hub: SharedHub, max_frame_bytes: usize) -> Self {
        Self {
            router: MessageRouter::new(hub.clone()),
            hub,
            max_frame_bytes,
        }
    }

    pub fn hub(&self) -> &SharedHub {
        &self.hub
    }

    /// Process one text frame. Operation errors are reported to the sender
    /// as an `error` frame; only a dead connection or a logout ends the loop.
    pub async fn handle_text(&self, connection: &Connection, text: &str) -> Dispatch {
        match self.dispatch(connection, text).await {
            Ok(next) => next,
            Err(ParlorError::ConnectionClosed) => Dispatch::Close,
            Err(e) if e.is_client_error() => {
                match &e {
                    ParlorError::StorageError(_) | ParlorError::UnknownUser(_) => {
                        error!("Operation for user {} failed: {}", connection.user_id, e)
                    }
                    _ => warn!("Rejected frame from user {}: {}", connection.user_id, e),
                }
                match connection.send_frame(&ServerFrame::error(&e)) {
                    Ok(()) => Dispatch::Continue,
                    Err(_) => Dispatch::Close,
                }
            }
            Err(e) => {
                error!("Connection {} failed: {}", connection.id, e);
                Dispatch::Close
            }
        }
    }

    async fn dispatch(&self, connection: &Connection, text: &str) -> Result<Dispatch> {
        if text.len() > self.max_frame_bytes {
            return Err(ParlorError::MessageTooLarge(text.len()));
        }

        let frame = ClientFrame::parse(text)?;
        debug!("User {} sent {:?}", connection.user_id, frame);

        match frame {
            ClientFrame::GetMessages { second_user } => {
                self.router.get_messages(connection, second_user).await?;
            }
            ClientFrame::SendMessage { second_user, message } => {
                match self.router.send_message(connection, second_user, &message).await? {
                    Delivery::Delivered(msg) => debug!("Message {} delivered", msg.id),
                    Delivery::Offline(msg) => debug!("Message {} stored for offline user", msg.id),
                }
            }
            ClientFrame::LoadUsers => {
                self.hub.broadcast_presence().await;
            }
            ClientFrame::Typing { second_user, is_typing } => {
                self.router.relay_typing(connection, second_user, is_typing);
            }
            ClientFrame::Logout => return Ok(Dispatch::Close),
        }

        Ok(Dispatch::Continue)
    }
}
