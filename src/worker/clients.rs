//! Pages controlled by the worker and the messages exchanged with them

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Messages a page sends to the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting worker now
    SkipWaiting,
}

impl ControlMessage {
    /// Decode a message payload; anything unrecognized is ignored
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Messages the worker posts to pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// A new version took control
    SwUpdated { message: String },
}

/// A connected page
#[derive(Debug)]
pub struct Client {
    id: Uuid,
    receiver: UnboundedReceiver<ClientMessage>,
}

impl Client {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next message. `None` once the client was disconnected.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        self.receiver.try_recv().ok()
    }

    pub fn into_receiver(self) -> UnboundedReceiver<ClientMessage> {
        self.receiver
    }
}

struct ClientEntry {
    sender: UnboundedSender<ClientMessage>,
    controller: Option<u64>,
}

/// Every page currently attached to the site
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<Uuid, ClientEntry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new, uncontrolled page
    pub async fn connect(&self) -> Client {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.clients.lock().await.insert(
            id,
            ClientEntry {
                sender,
                controller: None,
            },
        );
        debug!("Client {} connected", id);
        Client { id, receiver }
    }

    pub async fn disconnect(&self, id: Uuid) -> bool {
        let removed = self.clients.lock().await.remove(&id).is_some();
        if removed {
            debug!("Client {} disconnected", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }

    /// Make `worker_id` the controller of every attached page
    pub async fn claim(&self, worker_id: u64) -> usize {
        let mut clients = self.clients.lock().await;
        for entry in clients.values_mut() {
            entry.controller = Some(worker_id);
        }
        clients.len()
    }

    /// Worker currently controlling a page
    pub async fn controller_of(&self, id: Uuid) -> Option<u64> {
        self.clients
            .lock()
            .await
            .get(&id)
            .and_then(|entry| entry.controller)
    }

    /// Post a message to every page. Pages whose receiver is gone are dropped.
    pub async fn post_all(&self, message: ClientMessage) -> usize {
        let mut clients = self.clients.lock().await;
        clients.retain(|id, entry| {
            let delivered = entry.sender.send(message.clone()).is_ok();
            if !delivered {
                debug!("Dropping closed client {}", id);
            }
            delivered
        });
        clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_message_decodes_skip_waiting() {
        assert_eq!(
            ControlMessage::from_value(&json!({"type": "SKIP_WAITING"})),
            Some(ControlMessage::SkipWaiting)
        );
        assert_eq!(ControlMessage::from_value(&json!({"type": "PING"})), None);
        assert_eq!(ControlMessage::from_value(&json!("SKIP_WAITING")), None);
    }

    #[test]
    fn client_message_wire_format() {
        let message = ClientMessage::SwUpdated {
            message: "reload".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"type": "SW_UPDATED", "message": "reload"})
        );
    }

    #[tokio::test]
    async fn post_reaches_every_client() {
        let registry = ClientRegistry::new();
        let mut a = registry.connect().await;
        let mut b = registry.connect().await;

        let delivered = registry
            .post_all(ClientMessage::SwUpdated {
                message: "hi".to_string(),
            })
            .await;

        assert_eq!(delivered, 2);
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_some());
    }

    #[tokio::test]
    async fn closed_clients_are_pruned() {
        let registry = ClientRegistry::new();
        let kept = registry.connect().await;
        let gone = registry.connect().await;
        drop(gone);

        let delivered = registry
            .post_all(ClientMessage::SwUpdated {
                message: "hi".to_string(),
            })
            .await;
        assert_eq!(delivered, 1);
        assert_eq!(registry.len().await, 1);
        assert!(registry.controller_of(kept.id()).await.is_none());
    }

    #[tokio::test]
    async fn claim_sets_controller() {
        let registry = ClientRegistry::new();
        let client = registry.connect().await;
        assert_eq!(registry.claim(7).await, 1);
        assert_eq!(registry.controller_of(client.id()).await, Some(7));

        assert!(registry.disconnect(client.id()).await);
        assert!(registry.is_empty().await);
        assert!(!registry.disconnect(client.id()).await);
    }
}
