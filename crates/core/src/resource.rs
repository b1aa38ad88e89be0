//! Declared monitor resources.
//!
//! A [`Monitor`] is the declarative record the supervisor converges on:
//! it names an MQTT topic to watch and carries the lifecycle markers the
//! two-phase deletion protocol needs (finalizer tokens and a deletion
//! timestamp). Records are created and deleted by an external declarer;
//! the supervisor only ever touches the finalizer set.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace-qualified identity of a monitor resource.
///
/// Globally unique; used as the key of the supervisor's task table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Namespace the resource lives in.
    pub namespace: String,
    /// Name of the resource, unique within its namespace.
    pub name: String,
}

impl ResourceKey {
    /// Create a new key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Desired state of a monitor: the pub/sub topic to watch.
///
/// The topic is immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSpec {
    /// MQTT topic of the device to monitor.
    pub topic: String,
}

impl MonitorSpec {
    /// Create a new spec.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

/// Lifecycle phase of a monitor resource.
///
/// `Gone` is never stored on a record; it is the phase reported once the
/// backing store no longer holds the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorPhase {
    /// Live resource; a monitor task should be running.
    Active,
    /// Deletion requested; cleanup obligations may still be outstanding.
    Deleting,
    /// Fully deleted from the backing store.
    Gone,
}

/// A declared monitor resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    /// Identity of the resource.
    pub key: ResourceKey,
    /// Desired state.
    pub spec: MonitorSpec,
    /// Outstanding cleanup obligations. The resource cannot be removed
    /// from the backing store while this set is non-empty.
    #[serde(default)]
    pub finalizers: Vec<String>,
    /// Set when the declarer requests deletion.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl Monitor {
    /// Create a new monitor resource with no lifecycle markers.
    pub fn new(key: ResourceKey, spec: MonitorSpec) -> Self {
        Self {
            key,
            spec,
            finalizers: Vec::new(),
            deletion_timestamp: None,
        }
    }

    /// Whether deletion has been requested.
    pub fn deletion_requested(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Whether the given finalizer token is present.
    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizers.iter().any(|f| f == token)
    }

    /// Add a finalizer token. Idempotent.
    pub fn add_finalizer(&mut self, token: impl Into<String>) {
        let token = token.into();
        if !self.has_finalizer(&token) {
            self.finalizers.push(token);
        }
    }

    /// Remove a finalizer token. Idempotent.
    pub fn remove_finalizer(&mut self, token: &str) {
        self.finalizers.retain(|f| f != token);
    }

    /// Current lifecycle phase of this record.
    pub fn phase(&self) -> MonitorPhase {
        if self.deletion_requested() {
            MonitorPhase::Deleting
        } else {
            MonitorPhase::Active
        }
    }

    /// Mark the resource as deletion-requested.
    pub fn mark_for_deletion(&mut self) {
        if self.deletion_timestamp.is_none() {
            self.deletion_timestamp = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> Monitor {
        Monitor::new(
            ResourceKey::new("default", "kitchen"),
            MonitorSpec::new("/fr/fridge/51966"),
        )
    }

    #[test]
    fn test_key_display() {
        let key = ResourceKey::new("default", "kitchen");
        assert_eq!(key.to_string(), "default/kitchen");
    }

    #[test]
    fn test_finalizers_idempotent() {
        let mut m = monitor();
        m.add_finalizer("monitor.finalizers.frostwatch.dev");
        m.add_finalizer("monitor.finalizers.frostwatch.dev");
        assert_eq!(m.finalizers.len(), 1);

        m.remove_finalizer("monitor.finalizers.frostwatch.dev");
        m.remove_finalizer("monitor.finalizers.frostwatch.dev");
        assert!(m.finalizers.is_empty());
    }

    #[test]
    fn test_phase_transitions() {
        let mut m = monitor();
        assert_eq!(m.phase(), MonitorPhase::Active);
        assert!(!m.deletion_requested());

        m.mark_for_deletion();
        assert_eq!(m.phase(), MonitorPhase::Deleting);
        assert!(m.deletion_requested());

        // Marking twice keeps the original timestamp.
        let first = m.deletion_timestamp;
        m.mark_for_deletion();
        assert_eq!(m.deletion_timestamp, first);
    }
}
