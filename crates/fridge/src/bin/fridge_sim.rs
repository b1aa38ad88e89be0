//! Simulated fridge binary.
//!
//! Publishes the encoded fridge state on its topic once per tick,
//! advances the thermal model, plays back the door script, and echoes
//! anything received on the alert topic.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use frostwatch_core::state;
use frostwatch_fridge::{DoorEvent, DoorScript, FridgeModel};
use frostwatch_transport::{MqttTransport, MqttTransportConfig, QoS, Transport};

#[derive(Debug, Parser)]
#[command(name = "fridge-sim", about = "Simulated fridge publishing state over MQTT")]
struct Cli {
    /// Client identifier presented to the broker.
    client_id: String,

    /// Topic to publish state on.
    #[arg(default_value = "/fr/fridge/51966")]
    topic: String,

    /// Broker host.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Broker port.
    #[arg(long, default_value_t = 1883)]
    port: u16,

    /// Desired temperature in degrees.
    #[arg(long, default_value_t = 4.0)]
    desired: f64,

    /// Seconds between ticks.
    #[arg(long, default_value_t = 1)]
    interval_secs: u64,

    /// Door events, e.g. --door open@5 --door close@12.
    #[arg(long = "door")]
    door: Vec<DoorEvent>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(topic = %cli.topic, "starting fridge");

    let transport = Arc::new(
        MqttTransport::connect(MqttTransportConfig {
            host: cli.host,
            port: cli.port,
            client_id: cli.client_id,
            keep_alive: Duration::from_secs(30),
            tls: None,
        })
        .await?,
    );

    // Echo alerts the operator sends back to us.
    let mut alerts = transport
        .subscribe(&format!("{}/alert", cli.topic), QoS::AtMostOnce)
        .await?;
    tokio::spawn(async move {
        while let Some(message) = alerts.recv().await {
            info!(alert = %String::from_utf8_lossy(&message.payload), "ALERT");
        }
    });

    let script = DoorScript::new(cli.door);
    let mut fridge = FridgeModel::new(cli.desired);
    let mut ticker = tokio::time::interval(Duration::from_secs(cli.interval_secs.max(1)));
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping");
                return Ok(());
            }
        }

        if let Some(open) = script.at(tick) {
            info!(open, "door event");
            fridge.set_door_open(open);
        }

        match state::encode(fridge.state()) {
            Ok(payload) => {
                info!(%payload, "publishing state");
                if let Err(e) = transport
                    .publish(&cli.topic, QoS::AtLeastOnce, payload.into_bytes())
                    .await
                {
                    warn!(error = %e, "state publish failed");
                }
            }
            Err(e) => warn!(error = %e, "state encode failed"),
        }

        fridge.tick();
        tick += 1;
    }
}
