//! MQTT adapter backed by rumqttc.
//!
//! One [`MqttTransport`] wraps one broker session, shared by every
//! caller. A background driver task owns the rumqttc event loop; it
//! routes inbound publishes to the matching subscription channels and,
//! whenever the session is re-established, re-issues every registered
//! subscribe. Subscribers never see the reconnect: their channel simply
//! goes quiet until delivery resumes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, TlsConfiguration};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use frostwatch_core::TlsPaths;

use crate::error::{Error, Result};
use crate::{Message, QoS, Subscription, SubscriptionId, Transport};

/// Capacity of each subscription's delivery channel.
const CHANNEL_CAPACITY: usize = 64;

/// Capacity of the rumqttc request queue.
const REQUEST_CAPACITY: usize = 64;

/// Pause between reconnect attempts after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connection settings for [`MqttTransport`].
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// TLS material; plain TCP when absent.
    pub tls: Option<TlsPaths>,
}

struct Entry {
    topic: String,
    qos: QoS,
    sender: mpsc::Sender<Message>,
}

type Registry = Arc<RwLock<HashMap<SubscriptionId, Entry>>>;

/// rumqttc-backed [`Transport`].
///
/// The session lives for the life of the process: the driver task keeps
/// polling (and reconnecting) until the process exits.
pub struct MqttTransport {
    client: AsyncClient,
    registry: Registry,
}

impl MqttTransport {
    /// Set up a broker session and spawn the event-loop driver.
    ///
    /// The connection itself is established lazily by the driver; a
    /// broker that is down at startup surfaces as reconnect retries,
    /// not as an error here. Only unreadable TLS material fails fast.
    pub async fn connect(config: MqttTransportConfig) -> Result<Self> {
        let mut options = MqttOptions::new(config.client_id, config.host, config.port);
        options.set_keep_alive(config.keep_alive);

        if let Some(paths) = &config.tls {
            options.set_transport(rumqttc::Transport::tls_with_config(
                load_tls(paths).await?,
            ));
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let registry: Registry = Arc::new(RwLock::new(HashMap::new()));

        tokio::spawn(drive(eventloop, client.clone(), registry.clone()));

        Ok(Self { client, registry })
    }
}

async fn read_pem(path: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| Error::connect(format!("cannot read {}: {e}", path.display())))
}

async fn load_tls(paths: &TlsPaths) -> Result<TlsConfiguration> {
    let ca = read_pem(&paths.ca).await?;
    let client_cert = read_pem(&paths.client_cert).await?;
    let client_key = read_pem(&paths.client_key).await?;
    Ok(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth: Some((client_cert, client_key)),
    })
}

/// Event-loop driver: routes inbound publishes and restores
/// subscriptions after every (re)connect.
async fn drive(mut eventloop: EventLoop, client: AsyncClient, registry: Registry) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(session_present = ack.session_present, "broker session established");
                resubscribe(&client, &registry).await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                deliver(&registry, &publish.topic, publish.payload.to_vec()).await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "connection lost, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

async fn resubscribe(client: &AsyncClient, registry: &Registry) {
    let entries: Vec<(String, QoS)> = registry
        .read()
        .await
        .values()
        .map(|entry| (entry.topic.clone(), entry.qos))
        .collect();
    for (topic, qos) in entries {
        debug!(topic, "restoring subscription");
        if let Err(e) = client.subscribe(&topic, map_qos(qos)).await {
            warn!(topic, error = %e, "failed to restore subscription");
        }
    }
}

async fn deliver(registry: &Registry, topic: &str, payload: Vec<u8>) {
    let registry = registry.read().await;
    let message = Message::new(topic, payload);
    for entry in registry.values().filter(|e| e.topic == topic) {
        // A lagging subscriber drops the message; the transport is
        // at-least-once with no dedup, not a queue.
        let _ = entry.sender.try_send(message.clone());
    }
}

fn map_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<Subscription> {
        let id = SubscriptionId::new();
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        // Register first so a concurrent reconnect restores this
        // subscription too.
        self.registry.write().await.insert(
            id,
            Entry {
                topic: topic.to_string(),
                qos,
                sender,
            },
        );

        if let Err(e) = self.client.subscribe(topic, map_qos(qos)).await {
            self.registry.write().await.remove(&id);
            return Err(Error::subscribe(topic, e.to_string()));
        }

        debug!(%id, topic, "subscribed");
        Ok(Subscription::new(id, topic, receiver))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut registry = self.registry.write().await;
        let entry = registry
            .remove(&id)
            .ok_or(Error::SubscriptionNotFound(id))?;

        // Only drop the broker-side subscription when no other local
        // subscriber is left on the topic.
        let still_used = registry.values().any(|e| e.topic == entry.topic);
        drop(registry);

        if !still_used {
            self.client
                .unsubscribe(&entry.topic)
                .await
                .map_err(|e| Error::unsubscribe(&entry.topic, e.to_string()))?;
        }
        debug!(%id, topic = %entry.topic, "unsubscribed");
        Ok(())
    }

    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, map_qos(qos), false, payload)
            .await
            .map_err(|e| Error::publish(topic, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_mapping() {
        assert_eq!(map_qos(QoS::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(map_qos(QoS::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(map_qos(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_unreadable_tls_material_fails_fast() {
        let config = MqttTransportConfig {
            host: "localhost".to_string(),
            port: 8883,
            client_id: "frostwatch-test".to_string(),
            keep_alive: Duration::from_secs(30),
            tls: Some(TlsPaths {
                ca: "/nonexistent/ca.pem".into(),
                client_cert: "/nonexistent/crt.pem".into(),
                client_key: "/nonexistent/key.pem".into(),
            }),
        };
        let result = MqttTransport::connect(config).await;
        assert!(matches!(result, Err(Error::ConnectFailed { .. })));
    }
}
