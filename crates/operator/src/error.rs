//! Error types for the operator crate.

use std::time::Duration;

use thiserror::Error;

use frostwatch_core::ResourceKey;

/// Result type alias for operator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types.
///
/// Everything except [`Error::DuplicateTask`] is transient: the
/// triggering notification is redelivered and reconcile retried.
/// `DuplicateTask` signals a broken serialization invariant, which is a
/// programming defect rather than a runtime condition to recover from.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing store failed to fetch or persist a resource.
    #[error("store failure: {reason}")]
    Store { reason: String },

    /// The transport rejected a subscribe or unsubscribe.
    #[error(transparent)]
    Transport(#[from] frostwatch_transport::Error),

    /// A monitor task did not acknowledge cancellation in time.
    #[error("monitor task for '{monitor}' did not stop within {timeout:?}")]
    CancelTimeout { monitor: String, timeout: Duration },

    /// A second task was about to be recorded for an identity that
    /// already has one.
    #[error("duplicate monitor task for '{monitor}'")]
    DuplicateTask { monitor: String },
}

impl Error {
    /// Create a store error.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store {
            reason: reason.into(),
        }
    }

    /// Create a cancellation-timeout error.
    pub fn cancel_timeout(monitor: &ResourceKey, timeout: Duration) -> Self {
        Self::CancelTimeout {
            monitor: monitor.to_string(),
            timeout,
        }
    }

    /// Create a duplicate-task error.
    pub fn duplicate_task(monitor: &ResourceKey) -> Self {
        Self::DuplicateTask {
            monitor: monitor.to_string(),
        }
    }

    /// Whether redelivering the notification can recover this error.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::DuplicateTask { .. })
    }
}
