//! Operator configuration.
//!
//! Loaded from a TOML file; every section falls back to defaults so a
//! missing file only matters when the defaults do not reach a broker.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default payload published on the alert topic.
pub const DEFAULT_ALERT_PAYLOAD: &str = "close the door!";

/// Paths to the PEM files for a mutually-authenticated TLS session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsPaths {
    /// Server CA certificate.
    pub ca: PathBuf,
    /// Client certificate.
    pub client_cert: PathBuf,
    /// Client private key.
    pub client_key: PathBuf,
}

/// Broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// TLS material; plain TCP when absent.
    pub tls: Option<TlsPaths>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            keep_alive_secs: 30,
            tls: None,
        }
    }
}

/// Supervisor tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// How long to wait for a monitor task to acknowledge cancellation
    /// before treating the stop as failed and requeueing.
    pub cancel_timeout_secs: u64,
    /// Delay before a failed reconcile notification is redelivered.
    pub requeue_delay_ms: u64,
    /// Payload published on `<topic>/alert` when the door is open.
    pub alert_payload: String,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            cancel_timeout_secs: 5,
            requeue_delay_ms: 500,
            alert_payload: DEFAULT_ALERT_PAYLOAD.to_string(),
        }
    }
}

/// A monitor resource declared at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorDecl {
    /// Resource namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Resource name.
    pub name: String,
    /// Topic to monitor.
    pub topic: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Top-level operator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Supervisor tuning.
    pub supervisor: SupervisorSettings,
    /// Monitors declared at startup.
    pub monitors: Vec<MonitorDecl>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw).map_err(|e| Error::config(format!("cannot parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.supervisor.cancel_timeout_secs, 5);
        assert_eq!(config.supervisor.alert_payload, DEFAULT_ALERT_PAYLOAD);
        assert!(config.monitors.is_empty());
    }

    #[test]
    fn test_load_full_file() {
        let raw = r#"
            [mqtt]
            host = "broker.example.com"
            port = 8883

            [supervisor]
            cancel_timeout_secs = 2

            [[monitors]]
            name = "kitchen"
            topic = "/fr/fridge/51966"

            [[monitors]]
            namespace = "lab"
            name = "cold-room"
            topic = "/fr/fridge/cafe"
        "#;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.mqtt.host, "broker.example.com");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.supervisor.cancel_timeout_secs, 2);
        assert_eq!(config.monitors.len(), 2);
        assert_eq!(config.monitors[0].namespace, "default");
        assert_eq!(config.monitors[1].namespace, "lab");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/frostwatch.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_load_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"mqtt = \"not a table\"").unwrap();
        let result = Config::load(file.path());
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
