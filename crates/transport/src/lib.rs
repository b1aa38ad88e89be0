//! Pub/sub transport surface for Frostwatch.
//!
//! The supervisor and its monitor tasks talk to the outside world only
//! through the [`Transport`] trait: subscribe, unsubscribe, publish,
//! each at an explicit [`QoS`] level. Subscribers get a [`Subscription`]
//! with an owned receive channel instead of a callback, so callers can
//! `select!` between the next message and a cancellation signal.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryBroker`]: in-process exact-topic fanout, used by the
//!   test suites and local runs without a broker.
//! - [`MqttTransport`]: rumqttc-backed adapter with automatic
//!   reconnect and transparent resubscription; a dropped connection is
//!   invisible to subscribers (their channels simply go quiet until the
//!   session is back).

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use ulid::Ulid;

pub mod error;
pub mod memory;
pub mod mqtt;

pub use error::{Error, Result};
pub use memory::InMemoryBroker;
pub use mqtt::{MqttTransport, MqttTransportConfig};

/// Delivery-guarantee level for a published or subscribed message.
///
/// Maps directly onto MQTT levels 0/1/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce,
    /// Acknowledged delivery; duplicates possible.
    AtLeastOnce,
    /// Assured single delivery.
    ExactlyOnce,
}

/// An inbound message delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic the message arrived on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a new message.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Identity of an active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Ulid);

impl SubscriptionId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receive handle for an active subscription.
///
/// Dropping the handle does not unsubscribe; callers are expected to
/// call [`Transport::unsubscribe`] with the id when done.
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    receiver: mpsc::Receiver<Message>,
}

impl Subscription {
    /// Build a subscription from its parts. Used by implementations.
    pub fn new(id: SubscriptionId, topic: impl Into<String>, receiver: mpsc::Receiver<Message>) -> Self {
        Self {
            id,
            topic: topic.into(),
            receiver,
        }
    }

    /// The subscription id, needed to unsubscribe.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// The topic this subscription is bound to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Receive the next message.
    ///
    /// Returns `None` when the transport has dropped the subscription,
    /// e.g. after an unsubscribe or client shutdown.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

/// A persistent pub/sub connection shared by the supervisor and all of
/// its monitor tasks.
///
/// Implementations must be safe for concurrent use by any number of
/// callers, and must reconnect and resubscribe transparently: after a
/// connection drop, every still-active subscription keeps delivering
/// once the session is back, without any action by the subscriber.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to a topic at the given QoS level.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<Subscription>;

    /// Tear down an active subscription. Unknown ids are an error.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;

    /// Publish a payload to a topic at the given QoS level.
    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<()>;
}
