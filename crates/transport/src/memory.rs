//! In-process broker for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::{Message, QoS, Subscription, SubscriptionId, Transport};

/// Capacity of each subscription's delivery channel.
const CHANNEL_CAPACITY: usize = 64;

struct Entry {
    topic: String,
    sender: mpsc::Sender<Message>,
}

/// An in-process broker with exact-topic fanout.
///
/// QoS is accepted but irrelevant: delivery is a bounded in-memory
/// channel send. A subscriber that falls behind loses messages, which
/// matches the at-least-once-no-dedup stance of the real transport
/// closely enough for the supervisor's purposes.
#[derive(Default)]
pub struct InMemoryBroker {
    subscriptions: RwLock<HashMap<SubscriptionId, Entry>>,
}

impl InMemoryBroker {
    /// Create a new broker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a topic. Test introspection.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .values()
            .filter(|entry| entry.topic == topic)
            .count()
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<Subscription> {
        let id = SubscriptionId::new();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        self.subscriptions.write().await.insert(
            id,
            Entry {
                topic: topic.to_string(),
                sender,
            },
        );
        debug!(%id, topic, "subscribed");
        Ok(Subscription::new(id, topic, receiver))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        match self.subscriptions.write().await.remove(&id) {
            Some(entry) => {
                debug!(%id, topic = %entry.topic, "unsubscribed");
                Ok(())
            }
            None => Err(Error::SubscriptionNotFound(id)),
        }
    }

    async fn publish(&self, topic: &str, _qos: QoS, payload: Vec<u8>) -> Result<()> {
        let subscriptions = self.subscriptions.read().await;
        let message = Message::new(topic, payload);
        for entry in subscriptions.values().filter(|e| e.topic == topic) {
            // A lagging or closed subscriber is not a publish failure.
            let _ = entry.sender.try_send(message.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers_only() {
        let broker = InMemoryBroker::new();
        let mut sub_a = broker.subscribe("t/a", QoS::AtLeastOnce).await.unwrap();
        let mut sub_b = broker.subscribe("t/b", QoS::AtLeastOnce).await.unwrap();

        broker
            .publish("t/a", QoS::AtLeastOnce, b"hello".to_vec())
            .await
            .unwrap();

        let msg = sub_a.recv().await.unwrap();
        assert_eq!(msg.topic, "t/a");
        assert_eq!(msg.payload, b"hello");

        // Nothing for the other topic.
        assert!(sub_b.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_channel() {
        let broker = InMemoryBroker::new();
        let mut sub = broker.subscribe("t", QoS::AtLeastOnce).await.unwrap();
        assert_eq!(broker.subscriber_count("t").await, 1);

        broker.unsubscribe(sub.id()).await.unwrap();
        assert_eq!(broker.subscriber_count("t").await, 0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id() {
        let broker = InMemoryBroker::new();
        let result = broker.unsubscribe(SubscriptionId::new()).await;
        assert!(matches!(result, Err(Error::SubscriptionNotFound(_))));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let broker = InMemoryBroker::new();
        let result = broker.publish("t", QoS::AtMostOnce, vec![]).await;
        assert!(result.is_ok());
    }
}
