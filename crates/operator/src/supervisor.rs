//! The resource supervisor.
//!
//! Consumes the store's notification stream and converges the running
//! monitor tasks toward the declared resources: exactly one live task
//! per resource, torn down through the finalizer protocol on deletion.
//!
//! Two orderings are load-bearing and enforced by sequencing inside
//! [`Supervisor::reconcile`], not by external locking:
//!
//! - finalizer-add is persisted before the first subscribe, so the
//!   cleanup obligation is on record before anything needs cleanup;
//! - task termination (which includes the unsubscribe) completes before
//!   finalizer removal, so the store never drops a resource while its
//!   subscription is live.
//!
//! Notifications for different identities reconcile in parallel;
//! notifications for the same identity serialize on a per-identity
//! lock, which is what makes reconcile observably atomic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use frostwatch_core::{ResourceKey, SupervisorSettings};
use frostwatch_transport::Transport;

use crate::error::{Error, Result};
use crate::store::MonitorStore;
use crate::task::{MonitorTask, TaskHandle};

/// Finalizer token the supervisor records on every resource it watches.
pub const FINALIZER: &str = "monitor.finalizers.frostwatch.dev";

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How long to wait for a monitor task to acknowledge cancellation.
    pub cancel_timeout: Duration,
    /// Delay before a failed notification is redelivered.
    pub requeue_delay: Duration,
    /// Payload published on `<topic>/alert`.
    pub alert_payload: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&SupervisorSettings::default())
    }
}

impl From<&SupervisorSettings> for SupervisorConfig {
    fn from(settings: &SupervisorSettings) -> Self {
        Self {
            cancel_timeout: Duration::from_secs(settings.cancel_timeout_secs),
            requeue_delay: Duration::from_millis(settings.requeue_delay_ms),
            alert_payload: settings.alert_payload.clone(),
        }
    }
}

/// Declarative resource supervisor.
pub struct Supervisor {
    store: Arc<dyn MonitorStore>,
    transport: Arc<dyn Transport>,
    config: SupervisorConfig,
    /// identity -> running task. Mutated only on the reconcile path.
    tasks: Mutex<HashMap<ResourceKey, TaskHandle>>,
    /// Per-identity serialization of reconcile.
    locks: Mutex<HashMap<ResourceKey, Arc<Mutex<()>>>>,
}

impl Supervisor {
    /// Create a new supervisor.
    pub fn new(
        store: Arc<dyn MonitorStore>,
        transport: Arc<dyn Transport>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            tasks: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run the event loop until `shutdown` fires, then stop every task.
    ///
    /// Each notification reconciles on its own spawned task; transient
    /// failures are redelivered after [`SupervisorConfig::requeue_delay`].
    pub async fn run(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.store.watch().await;
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel::<ResourceKey>();

        info!("supervisor started");
        loop {
            let key = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event.key().clone(),
                    None => {
                        warn!("watch stream closed");
                        break;
                    }
                },
                Some(key) = requeue_rx.recv() => key,
                _ = shutdown.changed() => break,
            };

            let supervisor = Arc::clone(self);
            let requeue = requeue_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = supervisor.reconcile(&key).await {
                    if e.is_transient() {
                        warn!(monitor = %key, error = %e, "reconcile failed, requeueing");
                        tokio::time::sleep(supervisor.config.requeue_delay).await;
                        let _ = requeue.send(key);
                    } else {
                        error!(monitor = %key, error = %e, "reconcile failed on an invariant violation");
                    }
                }
            });
        }

        info!("supervisor stopping");
        self.shutdown().await;
    }

    /// Converge one identity toward its declared state. Idempotent and
    /// safe to call repeatedly, including concurrently from redelivered
    /// notifications: calls for the same identity serialize here.
    pub async fn reconcile(&self, key: &ResourceKey) -> Result<()> {
        let lock = self.identity_lock(key).await;
        let _serialized = lock.lock().await;

        let Some(mut monitor) = self.store.get(key).await? else {
            self.on_gone(key).await;
            self.prune_lock(key, &lock).await;
            return Ok(());
        };

        if !monitor.deletion_requested() {
            // Record the cleanup obligation before any subscription
            // exists.
            if !monitor.has_finalizer(FINALIZER) {
                monitor.add_finalizer(FINALIZER);
                self.store.update(monitor.clone()).await?;
            }
            self.start_task(key, &monitor.spec.topic).await
        } else if monitor.has_finalizer(FINALIZER) {
            // Task termination (and its unsubscribe) must complete
            // before the finalizer comes off.
            self.stop_task(key).await?;
            monitor.remove_finalizer(FINALIZER);
            self.store.update(monitor).await
        } else {
            // A prior pass already finished the protocol; the store is
            // about to drop (or already dropped) the record.
            debug!(monitor = %key, "deletion already finalized");
            Ok(())
        }
    }

    /// Start a monitor task unless one is already recorded.
    async fn start_task(&self, key: &ResourceKey, topic: &str) -> Result<()> {
        {
            let tasks = self.tasks.lock().await;
            if tasks.contains_key(key) {
                debug!(monitor = %key, "monitor task already running");
                return Ok(());
            }
        }

        info!(monitor = %key, topic, "start monitoring");
        let handle = MonitorTask::spawn(
            Arc::clone(&self.transport),
            topic,
            self.config.alert_payload.clone(),
        )
        .await?;

        let mut tasks = self.tasks.lock().await;
        if tasks.insert(key.clone(), handle).is_some() {
            // Unreachable under per-identity serialization. The evicted
            // handle's dropped cancel sender stops the older task.
            error!(monitor = %key, "second monitor task for one identity");
            return Err(Error::duplicate_task(key));
        }
        Ok(())
    }

    /// Cancel and await the task for this identity, if any. Cancelling
    /// an absent task is a no-op.
    async fn stop_task(&self, key: &ResourceKey) -> Result<()> {
        let Some(handle) = self.tasks.lock().await.remove(key) else {
            return Ok(());
        };

        info!(monitor = %key, "stop monitoring");
        match handle.stop(self.config.cancel_timeout).await {
            Ok(()) => Ok(()),
            Err(handle) => {
                // Keep the handle so a redelivered notification retries;
                // the finalizer must stay until the unsubscribe is done.
                self.tasks.lock().await.insert(key.clone(), handle);
                Err(Error::cancel_timeout(key, self.config.cancel_timeout))
            }
        }
    }

    /// The resource is fully deleted; clean up bookkeeping.
    async fn on_gone(&self, key: &ResourceKey) {
        debug!(monitor = %key, "resource gone");
        if let Some(handle) = self.tasks.lock().await.remove(key) {
            // Should have been stopped by the finalizer pass.
            warn!(monitor = %key, "monitor task outlived its resource, cancelling");
            handle.cancel();
        }
    }

    async fn identity_lock(&self, key: &ResourceKey) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .await
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drop the lock-table entry for a gone identity, but only while no
    /// other pass holds a clone of its lock. A queued pass keeps the
    /// entry alive, so a later arrival joins the same queue instead of
    /// minting a fresh lock and running alongside it. The map lock is
    /// held across the check, and [`Supervisor::identity_lock`] clones
    /// under that same lock, so the count cannot grow mid-prune.
    async fn prune_lock(&self, key: &ResourceKey, lock: &Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if let Some(stored) = locks.get(key) {
            // Two clones: the map's and the caller's.
            if Arc::ptr_eq(stored, lock) && Arc::strong_count(stored) == 2 {
                locks.remove(key);
            }
        }
    }

    /// Stop every running task. Finalizers are left untouched: on the
    /// next start the watch replay resumes the protocol where it stood.
    pub async fn shutdown(&self) {
        let handles: Vec<(ResourceKey, TaskHandle)> =
            self.tasks.lock().await.drain().collect();
        for (key, handle) in handles {
            if handle.stop(self.config.cancel_timeout).await.is_err() {
                warn!(monitor = %key, "monitor task did not stop before shutdown");
            }
        }
    }

    /// Number of live monitor tasks. Test introspection.
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Whether a task is recorded for this identity. Test introspection.
    pub async fn has_task(&self, key: &ResourceKey) -> bool {
        self.tasks.lock().await.contains_key(key)
    }
}
