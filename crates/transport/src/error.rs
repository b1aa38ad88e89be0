//! Error types for the transport crate.

use thiserror::Error;

use crate::SubscriptionId;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport error types.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection to the broker could not be established.
    #[error("connection failed: {reason}")]
    ConnectFailed { reason: String },

    /// A subscribe request was rejected.
    #[error("subscribe to '{topic}' failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    /// An unsubscribe request was rejected.
    #[error("unsubscribe from '{topic}' failed: {reason}")]
    UnsubscribeFailed { topic: String, reason: String },

    /// A publish was not accepted by the client.
    #[error("publish to '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },

    /// No active subscription with the given id.
    #[error("unknown subscription {0}")]
    SubscriptionNotFound(SubscriptionId),
}

impl Error {
    /// Create a connect error.
    pub fn connect(reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            reason: reason.into(),
        }
    }

    /// Create a subscribe error.
    pub fn subscribe(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsubscribe error.
    pub fn unsubscribe(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsubscribeFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a publish error.
    pub fn publish(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}
