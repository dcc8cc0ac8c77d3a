//! Settings loaded once at startup.
//!
//! The settings live in a TOML file under `~/.config/ledlink/` (or the path in
//! `LEDLINK_CONFIG`). Every section falls back to defaults, so a partial file
//! or a missing one still yields a usable configuration.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/ledlink";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "LEDLINK_CONFIG";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub network: NetworkSettings,
    pub actuator: ActuatorSettings,
    pub startup: StartupSettings,
}

/// MQTT broker connection parameters.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BrokerSettings {
    /// Broker URI, e.g. `mqtt://broker.hivemq.com` or `mqtt://10.0.0.2:1883`
    pub uri: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Pause between event loop polls after a connection error
    pub reconnect_delay_ms: u64,
    /// Capacity of the rumqttc request queue and of both event channels
    pub event_capacity: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            uri: "mqtt://broker.hivemq.com".to_string(),
            client_id: "ledlink".to_string(),
            keep_alive_secs: 120,
            reconnect_delay_ms: 2000,
            event_capacity: 32,
        }
    }
}

impl BrokerSettings {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Link monitor parameters.
///
/// There is no SSID or password: the monitor joins nothing and only checks
/// that `probe` is reachable.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NetworkSettings {
    /// `host:port` probed to decide whether the link is up. Defaults to the broker.
    pub probe: Option<String>,
    pub association_timeout_ms: u64,
    pub supervision_interval_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            probe: None,
            association_timeout_ms: 5000,
            supervision_interval_ms: 5000,
            retry_delay_ms: 1000,
        }
    }
}

impl NetworkSettings {
    pub fn association_timeout(&self) -> Duration {
        Duration::from_millis(self.association_timeout_ms)
    }

    pub fn supervision_interval(&self) -> Duration {
        Duration::from_millis(self.supervision_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorBackend {
    #[default]
    Gpio,
    Log,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ActuatorSettings {
    pub backend: ActuatorBackend,
    /// BCM pin number of the output line
    pub pin: u8,
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            backend: ActuatorBackend::Gpio,
            pin: 19,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StartupSettings {
    /// Upper bound on waiting for the link before starting MQTT
    pub connect_timeout_ms: u64,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

impl StartupSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Settings {
    pub fn path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse settings: {}", e))
    }

    /// Writes the default settings if no file exists yet.
    pub async fn ensure_default() -> Result<PathBuf> {
        let path = Self::path();
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if settings file exists: {}", e))?
        {
            debug!("Settings file present at {}", path.display());
            return Ok(path);
        }

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| eyre!("Failed to create settings directory: {}", e))?;
        }

        let content = toml::to_string_pretty(&Settings::default())
            .map_err(|e| eyre!("Failed to serialize default settings: {}", e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| eyre!("Failed to write default settings: {}", e))?;

        info!("Wrote default settings to {}", path.display());
        Ok(path)
    }

    pub async fn load() -> Result<Self> {
        let path = Self::ensure_default().await?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read settings file {}: {}", path.display(), e))?;

        let settings = Self::from_toml(&content)?;
        info!("Loaded settings from {}", path.display());
        debug!("Settings: {:?}", settings);
        Ok(settings)
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_device() {
        let settings = Settings::default();
        assert_eq!(settings.broker.uri, "mqtt://broker.hivemq.com");
        assert_eq!(settings.actuator.pin, 19);
        assert_eq!(settings.actuator.backend, ActuatorBackend::Gpio);
        assert_eq!(settings.startup.connect_timeout(), Duration::from_secs(10));
        assert_eq!(settings.network.probe, None);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let settings = Settings::from_toml(
            r#"
            [broker]
            uri = "mqtt://10.0.0.2:1884"

            [actuator]
            backend = "log"
            "#,
        )
        .unwrap();

        assert_eq!(settings.broker.uri, "mqtt://10.0.0.2:1884");
        assert_eq!(settings.broker.client_id, "ledlink");
        assert_eq!(settings.actuator.backend, ActuatorBackend::Log);
        assert_eq!(settings.actuator.pin, 19);
        assert_eq!(settings.network, NetworkSettings::default());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn defaults_survive_serialization() {
        let content = toml::to_string_pretty(&Settings::default()).unwrap();
        assert_eq!(Settings::from_toml(&content).unwrap(), Settings::default());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Settings::from_toml("[actuator]\nbackend = \"pwm\"").is_err());
    }
}
