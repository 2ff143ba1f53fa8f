//! Direct message routing between two users

use log::{debug, info};

use crate::core::connection::Connection;
use crate::core::hub::SharedHub;
use crate::core::message::{ChatMessage, UserId};
use crate::core::message_types::ServerFrame;
use crate::error::{ParlorError, Result};
use crate::security::sanitize_input;

/// Result of routing one message
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Both parties received the committed message
    Delivered(ChatMessage),
    /// Stored, but the addressee is not connected
    Offline(ChatMessage),
}

impl Delivery {
    pub fn message(&self) -> &ChatMessage {
        match self {
            Delivery::Delivered(message) | Delivery::Offline(message) => message,
        }
    }
}

pub struct MessageRouter {
    hub: SharedHub,
}

impl MessageRouter {
    pub fn new(hub: SharedHub) -> Self {
        Self { hub }
    }

    /// Persist a message from `sender` and forward it.
    ///
    /// The frame always carries the row as read back from the store, never
    /// the client's own copy.
    pub async fn send_message(&self, sender: &Connection, receiver_id: UserId, body: &str) -> Result<Delivery> {
        if body.is_empty() {
            return Err(ParlorError::ValidationError("message is empty".to_string()));
        }
        if sender.user_id == 0 || receiver_id == 0 {
            return Err(ParlorError::ValidationError("user id is missing".to_string()));
        }

        let body = sanitize_input(body);
        let store = self.hub.store();
        let row_id = store.insert(sender.user_id, receiver_id, &body).await?;
        let message = store.get_by_id(row_id).await?;

        let Some(receiver) = self.hub.registry().get(receiver_id) else {
            debug!("User {} is offline, message {} stored", receiver_id, row_id);
            sender.send_frame(&ServerFrame::Offline {
                sender: sender.user_id,
                receiver: receiver_id,
            })?;
            return Ok(Delivery::Offline(message));
        };

        let frame = ServerFrame::Delivered {
            sender: sender.user_id,
            receiver: receiver_id,
            messages: message.clone(),
        };
        sender.send_frame(&frame)?;
        if receiver.id != sender.id {
            if let Err(e) = receiver.send_frame(&frame) {
                // The receiver's own serve loop unregisters it
                info!("Message {} not pushed to user {}: {}", row_id, receiver_id, e);
            }
        }

        Ok(Delivery::Delivered(message))
    }

    /// Send `requester` its full conversation with `peer`
    pub async fn get_messages(&self, requester: &Connection, peer: UserId) -> Result<usize> {
        if requester.user_id == 0 || peer == 0 {
            return Err(ParlorError::ValidationError("user id is missing".to_string()));
        }

        let messages = self.hub.store().conversation(requester.user_id, peer).await?;
        let count = messages.len();
        requester.send_frame(&ServerFrame::Conversation {
            sender: requester.user_id,
            receiver: peer,
            messages,
        })?;
        Ok(count)
    }

    /// Forward a typing indicator to `peer` if connected. Returns whether it was sent.
    pub fn relay_typing(&self, sender: &Connection, peer: UserId, is_typing: bool) -> bool {
        if peer == 0 || peer == sender.user_id {
            return false;
        }
        match self.hub.registry().get(peer) {
            Some(receiver) => receiver
                .send_frame(&ServerFrame::Typing {
                    sender: sender.user_id,
                    receiver: peer,
                    is_typing,
                })
                .is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hub::ChatHub;
    use crate::core::message::UserSummary;
    use crate::storage::MemoryStore;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use warp::ws::Message as WsMessage;

    fn setup() -> (SharedHub, MessageRouter) {
        let store = Arc::new(MemoryStore::with_users([
            UserSummary::new(1, "alice"),
            UserSummary::new(2, "bob"),
        ]));
        let hub = Arc::new(ChatHub::new(store.clone(), store));
        (hub.clone(), MessageRouter::new(hub))
    }

    fn frames(rx: &mut mpsc::UnboundedReceiver<WsMessage>) -> Vec<ServerFrame> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Ok(text) = msg.to_str() {
                out.push(serde_json::from_str(text).unwrap());
            }
        }
        out
    }

    #[tokio::test]
    async fn test_rejects_empty_body_and_zero_ids() {
        let (hub, router) = setup();
        let (tx, _rx) = mpsc::unbounded_channel();
        let alice = hub.connect(1, tx).await;

        assert!(matches!(
            router.send_message(&alice, 2, "").await,
            Err(ParlorError::ValidationError(_))
        ));
        assert!(matches!(
            router.send_message(&alice, 0, "hi").await,
            Err(ParlorError::ValidationError(_))
        ));
        assert!(router.get_messages(&alice, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_body_is_sanitized_before_storage() {
        let (hub, router) = setup();
        let (tx, _rx) = mpsc::unbounded_channel();
        let alice = hub.connect(1, tx).await;

        let delivery = router.send_message(&alice, 2, "<b>hi</b>").await.unwrap();
        assert_eq!(delivery.message().body, "&lt;b&gt;hi&lt;/b&gt;");
    }

    #[tokio::test]
    async fn test_typing_relayed_only_to_connected_peer() {
        let (hub, router) = setup();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let alice = hub.connect(1, tx1).await;

        assert!(!router.relay_typing(&alice, 2, true));

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.connect(2, tx2).await;
        frames(&mut rx2);

        assert!(router.relay_typing(&alice, 2, true));
        assert_eq!(
            frames(&mut rx2),
            vec![ServerFrame::Typing {
                sender: 1,
                receiver: 2,
                is_typing: true
            }]
        );
    }

    #[tokio::test]
    async fn test_online_receiver_gets_same_frame_as_sender() {
        let (hub, router) = setup();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let alice = hub.connect(1, tx1).await;
        hub.connect(2, tx2).await;
        frames(&mut rx1);
        frames(&mut rx2);

        let delivery = router.send_message(&alice, 2, "hello bob").await.unwrap();
        assert!(matches!(delivery, Delivery::Delivered(_)));

        let to_alice = frames(&mut rx1);
        let to_bob = frames(&mut rx2);
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice, to_bob);
        match &to_bob[0] {
            ServerFrame::Delivered { sender, receiver, messages } => {
                assert_eq!((*sender, *receiver), (1, 2));
                assert_eq!(messages.id, delivery.message().id);
                assert_eq!(messages.receiver_name, "bob");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_conversation_round_trip() {
        let (hub, router) = setup();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let alice = hub.connect(1, tx1).await;
        let bob = hub.connect(2, tx2).await;

        let sends = [(&alice, 2, "a"), (&bob, 1, "b"), (&bob, 1, "c"), (&alice, 2, "d"), (&bob, 1, "e")];
        for (from, to, body) in sends {
            router.send_message(from, to, body).await.unwrap();
        }
        frames(&mut rx1);
        frames(&mut rx2);

        // Either side sees the same history
        for (conn, peer, rx) in [(&alice, 2, &mut rx1), (&bob, 1, &mut rx2)] {
            assert_eq!(router.get_messages(conn, peer).await.unwrap(), 5);
            match frames(rx).pop() {
                Some(ServerFrame::Conversation { messages, .. }) => {
                    let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
                    assert_eq!(bodies, vec!["a", "b", "c", "d", "e"]);
                    let senders: Vec<UserId> = messages.iter().map(|m| m.sender_id).collect();
                    assert_eq!(senders, vec![1, 2, 2, 1, 2]);
                    assert!(messages.windows(2).all(|w| w[0].created_at < w[1].created_at));
                }
                other => panic!("unexpected frame {:?}", other),
            }
        }
    }
}
