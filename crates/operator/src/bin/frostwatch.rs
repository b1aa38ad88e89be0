//! Frostwatch operator binary.
//!
//! Connects to the broker, seeds the resource store with the monitors
//! declared in the configuration file, and runs the supervisor until
//! interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use frostwatch_core::{Config, Monitor, MonitorSpec, ResourceKey, TlsPaths};
use frostwatch_operator::{InMemoryStore, Supervisor, SupervisorConfig};
use frostwatch_transport::{MqttTransport, MqttTransportConfig};

#[derive(Debug, Parser)]
#[command(name = "frostwatch", about = "Declarative fridge monitor supervisor")]
struct Cli {
    /// Client identifier presented to the broker.
    client_id: String,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "frostwatch.toml")]
    config: PathBuf,

    /// Override the broker host.
    #[arg(long)]
    host: Option<String>,

    /// Override the broker port.
    #[arg(long)]
    port: Option<u16>,

    /// Path to the server CA certificate (enables TLS together with
    /// --client-cert and --client-key).
    #[arg(long)]
    ca: Option<PathBuf>,

    /// Path to the client certificate.
    #[arg(long)]
    client_cert: Option<PathBuf>,

    /// Path to the client key.
    #[arg(long)]
    client_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        info!(path = %cli.config.display(), "no configuration file, using defaults");
        Config::default()
    };

    if let Some(host) = cli.host {
        config.mqtt.host = host;
    }
    if let Some(port) = cli.port {
        config.mqtt.port = port;
    }
    if let (Some(ca), Some(client_cert), Some(client_key)) =
        (cli.ca, cli.client_cert, cli.client_key)
    {
        config.mqtt.tls = Some(TlsPaths {
            ca,
            client_cert,
            client_key,
        });
    }

    let transport = Arc::new(
        MqttTransport::connect(MqttTransportConfig {
            host: config.mqtt.host.clone(),
            port: config.mqtt.port,
            client_id: cli.client_id,
            keep_alive: Duration::from_secs(config.mqtt.keep_alive_secs),
            tls: config.mqtt.tls.clone(),
        })
        .await?,
    );

    let store = Arc::new(InMemoryStore::new());
    for decl in &config.monitors {
        info!(namespace = %decl.namespace, name = %decl.name, topic = %decl.topic, "declaring monitor");
        store
            .apply(Monitor::new(
                ResourceKey::new(&decl.namespace, &decl.name),
                MonitorSpec::new(&decl.topic),
            ))
            .await;
    }

    let supervisor = Arc::new(Supervisor::new(
        store,
        transport,
        SupervisorConfig::from(&config.supervisor),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    let _ = shutdown_tx.send(true);
    runner.await?;

    Ok(())
}
