//! Monitor tasks.
//!
//! One task per declared resource. The task owns a subscription on the
//! resource's topic and loops over an explicit select: next inbound
//! message, or cancellation. Inbound state messages are decoded and
//! checked against the safety predicate (door open); a violation
//! publishes the alert payload to `<topic>/alert` at QoS 1. On
//! cancellation the task unsubscribes before it terminates, which is
//! the half of the deletion-ordering guarantee this module owns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use frostwatch_core::state;
use frostwatch_transport::{Message, QoS, Subscription, Transport};

use crate::error::Result;

/// Supervisor-side record of a running monitor task.
///
/// Holds the cancellation signal for exactly one task. At most one
/// handle exists per resource identity at any time.
pub struct TaskHandle {
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Signal cancellation without waiting. Idempotent.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Signal cancellation and wait for the task to terminate, which
    /// includes its unsubscribe.
    ///
    /// On timeout the handle is returned so the caller can keep it and
    /// retry; the task may still be draining.
    pub async fn stop(mut self, timeout: Duration) -> std::result::Result<(), TaskHandle> {
        self.cancel();
        match tokio::time::timeout(timeout, &mut self.join).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    warn!(error = %e, "monitor task terminated abnormally");
                }
                Ok(())
            }
            Err(_) => Err(self),
        }
    }

    /// Whether the underlying task has already terminated.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// A background task monitoring one topic.
pub struct MonitorTask;

impl MonitorTask {
    /// Subscribe to the topic and spawn the monitor loop.
    ///
    /// The subscription is taken before the task is spawned: a rejected
    /// subscribe produces an error and no task, never a dead handle.
    pub async fn spawn(
        transport: Arc<dyn Transport>,
        topic: &str,
        alert_payload: String,
    ) -> Result<TaskHandle> {
        let subscription = transport.subscribe(topic, QoS::AtLeastOnce).await?;
        let (cancel, cancel_rx) = watch::channel(false);
        let join = tokio::spawn(run(transport, subscription, cancel_rx, alert_payload));
        Ok(TaskHandle { cancel, join })
    }
}

async fn run(
    transport: Arc<dyn Transport>,
    mut subscription: Subscription,
    mut cancel: watch::Receiver<bool>,
    alert_payload: String,
) {
    let topic = subscription.topic().to_string();
    let alert_topic = format!("{topic}/alert");
    info!(topic, "monitoring started");

    loop {
        tokio::select! {
            message = subscription.recv() => match message {
                Some(message) => {
                    inspect(transport.as_ref(), &alert_topic, &alert_payload, &message).await;
                }
                None => {
                    warn!(topic, "subscription channel closed by transport");
                    break;
                }
            },
            // A dropped sender counts as cancellation too.
            _ = cancel.changed() => break,
        }
    }

    if let Err(e) = transport.unsubscribe(subscription.id()).await {
        warn!(topic, error = %e, "unsubscribe failed");
    }
    info!(topic, "monitoring stopped");
}

/// Decode one state message and publish an alert if the door is open.
///
/// Both decode failures and publish failures are local: log and move
/// on. Messages are not redelivered on request, and the next violating
/// message retriggers the alert anyway.
async fn inspect(transport: &dyn Transport, alert_topic: &str, alert_payload: &str, message: &Message) {
    let state = match state::decode(&message.payload) {
        Ok(state) => state,
        Err(e) => {
            warn!(topic = %message.topic, error = %e, "discarding undecodable message");
            return;
        }
    };

    debug!(topic = %message.topic, %state, "state received");

    if state.door_open {
        info!(topic = %message.topic, "door open, publishing alert");
        if let Err(e) = transport
            .publish(alert_topic, QoS::AtLeastOnce, alert_payload.as_bytes().to_vec())
            .await
        {
            warn!(topic = alert_topic, error = %e, "alert publish failed");
        }
    }
}
