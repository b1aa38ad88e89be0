//! Behavior tests for a single monitor task: the safety predicate,
//! decode-failure tolerance, and the unsubscribe on cancellation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use frostwatch_operator::MonitorTask;
use frostwatch_transport::{InMemoryBroker, QoS, Transport};

const TOPIC: &str = "t";
const ALERT_TOPIC: &str = "t/alert";
const ALERT: &str = "close the door!";

async fn publish_state(broker: &InMemoryBroker, payload: &[u8]) {
    broker
        .publish(TOPIC, QoS::AtLeastOnce, payload.to_vec())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_door_open_triggers_alert() {
    let broker = Arc::new(InMemoryBroker::new());
    let mut alerts = broker.subscribe(ALERT_TOPIC, QoS::AtLeastOnce).await.unwrap();

    let handle = MonitorTask::spawn(broker.clone(), TOPIC, ALERT.to_string())
        .await
        .unwrap();
    assert_eq!(broker.subscriber_count(TOPIC).await, 1);

    publish_state(&broker, br#"{"T":6,"D":4,"O":true}"#).await;
    let alert = tokio::time::timeout(Duration::from_secs(2), alerts.recv())
        .await
        .expect("no alert published")
        .unwrap();
    assert_eq!(alert.topic, ALERT_TOPIC);
    assert_eq!(alert.payload, ALERT.as_bytes());

    // A healthy state publishes nothing.
    publish_state(&broker, br#"{"T":4,"D":4,"O":false}"#).await;
    let quiet = tokio::time::timeout(Duration::from_millis(200), alerts.recv()).await;
    assert!(quiet.is_err(), "unexpected alert for closed door");

    handle.stop(Duration::from_secs(1)).await.ok();
}

#[tokio::test]
async fn test_undecodable_message_is_discarded() {
    let broker = Arc::new(InMemoryBroker::new());
    let mut alerts = broker.subscribe(ALERT_TOPIC, QoS::AtLeastOnce).await.unwrap();

    let handle = MonitorTask::spawn(broker.clone(), TOPIC, ALERT.to_string())
        .await
        .unwrap();

    publish_state(&broker, br#"{"T":"warm"}"#).await;
    publish_state(&broker, b"not json at all").await;

    // The task survives and still reacts to the next valid violation.
    publish_state(&broker, br#"{"T":6,"D":4,"O":true}"#).await;
    let alert = tokio::time::timeout(Duration::from_secs(2), alerts.recv())
        .await
        .expect("task died on undecodable input")
        .unwrap();
    assert_eq!(alert.payload, ALERT.as_bytes());

    handle.stop(Duration::from_secs(1)).await.ok();
}

#[tokio::test]
async fn test_stop_unsubscribes() {
    let broker = Arc::new(InMemoryBroker::new());
    let handle = MonitorTask::spawn(broker.clone(), TOPIC, ALERT.to_string())
        .await
        .unwrap();
    assert_eq!(broker.subscriber_count(TOPIC).await, 1);

    assert!(handle.stop(Duration::from_secs(1)).await.is_ok());
    assert_eq!(broker.subscriber_count(TOPIC).await, 0);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let broker = Arc::new(InMemoryBroker::new());
    let handle = MonitorTask::spawn(broker.clone(), TOPIC, ALERT.to_string())
        .await
        .unwrap();

    handle.cancel();
    handle.cancel();
    assert!(handle.stop(Duration::from_secs(1)).await.is_ok());
    assert_eq!(broker.subscriber_count(TOPIC).await, 0);
}
