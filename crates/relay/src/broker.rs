//! Topic-keyed fan-out broker.
//!
//! Pure pub/sub primitive: every subscriber of a topic receives every
//! event published to it, in publish order, at most once, best-effort.
//! Addressing (dropping events meant for a different client) is the
//! transport layer's job, not the broker's.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

use crate::protocol::RelayEvent;

/// Receiver half handed to a connection's transport task.
pub type RelayReceiver = mpsc::UnboundedReceiver<RelayEvent>;

struct Subscriber {
    sender: mpsc::UnboundedSender<RelayEvent>,
}

/// Shared subscriber registry.
///
/// Thread-safe via interior `RwLock`; wrap in `Arc` and clone into run
/// tasks and connection handlers. Publishing to a topic with no live
/// subscribers is a no-op.
pub struct RelayBroker {
    topics: RwLock<HashMap<String, HashMap<String, Subscriber>>>,
}

impl RelayBroker {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Join a topic.
    ///
    /// `subscription_id` identifies the connection for later
    /// [`unsubscribe`](Self::unsubscribe); subscribing twice with the
    /// same id replaces the earlier channel.
    pub async fn subscribe(&self, topic: &str, subscription_id: &str) -> RelayReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_default()
            .insert(subscription_id.to_string(), Subscriber { sender: tx });
        rx
    }

    /// Leave a topic; unknown ids are a no-op.
    pub async fn unsubscribe(&self, topic: &str, subscription_id: &str) {
        let mut topics = self.topics.write().await;
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.remove(subscription_id);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Deliver an event to every subscriber of a topic.
    ///
    /// Subscribers whose channels are closed are skipped; they are
    /// removed when their connection task unsubscribes.
    pub async fn publish(&self, topic: &str, event: RelayEvent) {
        let topics = self.topics.read().await;
        let Some(subscribers) = topics.get(topic) else {
            return;
        };
        for subscriber in subscribers.values() {
            let _ = subscriber.sender.send(event.clone());
        }
    }

    /// Number of live subscriptions on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map_or(0, HashMap::len)
    }
}

impl Default for RelayBroker {
    fn default() -> Self {
        Self::new()
    }
}
