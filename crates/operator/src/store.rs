//! Declarative resource store contract and in-memory implementation.
//!
//! The supervisor consumes resources through [`MonitorStore`] only; the
//! etcd-backed substrate a production deployment would sit on is out of
//! scope, so [`InMemoryStore`] stands in for it. The contract carries
//! the two pieces the finalizer protocol depends on:
//!
//! - `watch()` replays every existing resource before live events, so a
//!   restarted supervisor converges back to one task per resource.
//! - `update()` of a deletion-requested record with an empty finalizer
//!   set is what actually removes the record. The store never deletes a
//!   resource that still carries a cleanup obligation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use frostwatch_core::{Monitor, ResourceKey};

use crate::error::{Error, Result};

/// A change notification from the store.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A resource was created or mutated (including deletion requests
    /// and finalizer updates).
    Applied(Monitor),
    /// A resource was removed from the store.
    Deleted(ResourceKey),
}

impl WatchEvent {
    /// The identity the event is about.
    pub fn key(&self) -> &ResourceKey {
        match self {
            Self::Applied(monitor) => &monitor.key,
            Self::Deleted(key) => key,
        }
    }
}

/// Storage and watch substrate for monitor resources.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Fetch a resource by identity. `None` means fully deleted.
    async fn get(&self, key: &ResourceKey) -> Result<Option<Monitor>>;

    /// Persist a mutated resource.
    ///
    /// Persisting a deletion-requested resource whose finalizer set is
    /// empty removes it from the store.
    async fn update(&self, monitor: Monitor) -> Result<()>;

    /// Open a notification stream. Existing resources are replayed as
    /// `Applied` events before any live event.
    async fn watch(&self) -> mpsc::UnboundedReceiver<WatchEvent>;
}

#[derive(Default)]
struct Inner {
    records: HashMap<ResourceKey, Monitor>,
    watchers: Vec<mpsc::UnboundedSender<WatchEvent>>,
}

impl Inner {
    fn notify(&mut self, event: WatchEvent) {
        self.watchers.retain(|w| w.send(event.clone()).is_ok());
    }

    /// Drop the record if deletion is requested and no cleanup
    /// obligation remains; otherwise persist the mutation.
    fn persist(&mut self, monitor: Monitor) {
        if monitor.deletion_requested() && monitor.finalizers.is_empty() {
            debug!(monitor = %monitor.key, "removing finalized resource");
            self.records.remove(&monitor.key);
            self.notify(WatchEvent::Deleted(monitor.key));
        } else {
            self.records.insert(monitor.key.clone(), monitor.clone());
            self.notify(WatchEvent::Applied(monitor));
        }
    }
}

/// In-memory [`MonitorStore`] with the declarer-side surface the
/// operator binary and the test suites use.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource. Creating an existing resource is a no-op
    /// resync (a monitor's topic is immutable after creation); either way an
    /// `Applied` event is emitted.
    pub async fn apply(&self, monitor: Monitor) {
        let mut inner = self.inner.lock().await;
        let current = inner
            .records
            .entry(monitor.key.clone())
            .or_insert(monitor)
            .clone();
        inner.notify(WatchEvent::Applied(current));
    }

    /// Request deletion of a resource. With no outstanding finalizers
    /// the record is removed immediately.
    pub async fn mark_for_deletion(&self, key: &ResourceKey) {
        let mut inner = self.inner.lock().await;
        let Some(mut monitor) = inner.records.get(key).cloned() else {
            return;
        };
        monitor.mark_for_deletion();
        inner.persist(monitor);
    }

    /// Whether the store still holds a record for this identity.
    pub async fn contains(&self, key: &ResourceKey) -> bool {
        self.inner.lock().await.records.contains_key(key)
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MonitorStore for InMemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Monitor>> {
        Ok(self.inner.lock().await.records.get(key).cloned())
    }

    async fn update(&self, monitor: Monitor) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.records.contains_key(&monitor.key) {
            return Err(Error::store(format!(
                "resource '{}' does not exist",
                monitor.key
            )));
        }
        inner.persist(monitor);
        Ok(())
    }

    async fn watch(&self) -> mpsc::UnboundedReceiver<WatchEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        for monitor in inner.records.values() {
            let _ = sender.send(WatchEvent::Applied(monitor.clone()));
        }
        inner.watchers.push(sender);
        receiver
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use frostwatch_core::MonitorSpec;

    use super::*;

    fn monitor(name: &str) -> Monitor {
        Monitor::new(
            ResourceKey::new("default", name),
            MonitorSpec::new(format!("/fr/fridge/{name}")),
        )
    }

    #[tokio::test]
    async fn test_watch_replays_existing_resources() {
        let store = InMemoryStore::new();
        store.apply(monitor("a")).await;
        store.apply(monitor("b")).await;

        let mut watch = store.watch().await;
        let mut replayed = Vec::new();
        for _ in 0..2 {
            match watch.recv().await {
                Some(WatchEvent::Applied(m)) => replayed.push(m.key.name),
                other => panic!("expected replayed Applied event, got {other:?}"),
            }
        }
        replayed.sort();
        assert_eq!(replayed, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_update_removes_finalized_deleted_resource() {
        let store = InMemoryStore::new();
        store.apply(monitor("a")).await;

        let key = ResourceKey::new("default", "a");
        let mut m = store.get(&key).await.unwrap().unwrap();
        m.add_finalizer("monitor.finalizers.frostwatch.dev");
        store.update(m.clone()).await.unwrap();

        // Deletion request leaves the record while the finalizer holds.
        store.mark_for_deletion(&key).await;
        assert!(store.contains(&key).await);

        let mut m = store.get(&key).await.unwrap().unwrap();
        assert!(m.deletion_requested());
        m.remove_finalizer("monitor.finalizers.frostwatch.dev");
        store.update(m).await.unwrap();
        assert!(!store.contains(&key).await);
    }

    #[tokio::test]
    async fn test_mark_for_deletion_without_finalizers_removes_immediately() {
        let store = InMemoryStore::new();
        store.apply(monitor("a")).await;

        let key = ResourceKey::new("default", "a");
        let mut watch = store.watch().await;
        let _ = watch.recv().await; // replay

        store.mark_for_deletion(&key).await;
        assert!(!store.contains(&key).await);
        assert!(matches!(watch.recv().await, Some(WatchEvent::Deleted(k)) if k == key));
    }

    #[tokio::test]
    async fn test_update_unknown_resource_fails() {
        let store = InMemoryStore::new();
        let result = store.update(monitor("ghost")).await;
        assert!(matches!(result, Err(Error::Store { .. })));
    }

    #[tokio::test]
    async fn test_apply_existing_is_resync() {
        let store = InMemoryStore::new();
        store.apply(monitor("a")).await;

        let key = ResourceKey::new("default", "a");
        let mut m = store.get(&key).await.unwrap().unwrap();
        m.add_finalizer("monitor.finalizers.frostwatch.dev");
        store.update(m).await.unwrap();

        // Re-applying must not clobber lifecycle markers.
        store.apply(monitor("a")).await;
        let m = store.get(&key).await.unwrap().unwrap();
        assert_eq!(m.finalizers.len(), 1);
    }
}
