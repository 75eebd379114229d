//! Station configuration
//!
//! Loaded from an optional `config/station` file (any format the `config`
//! crate understands) overlaid with `GCS__*` environment variables, e.g.
//! `GCS__SERVER_PORT=9000`.

use crate::connection::ConnectionConfig;
use groundstation_shared::defaults;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/station";
pub const ENV_PREFIX: &str = "GCS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub server_host: String,
    pub server_port: u16,
    pub server_path: String,
    /// Identifies this station in logs
    pub client_id: String,
    /// Only this vehicle is tracked when set
    pub vehicle_filter: Option<String>,
    pub stale_threshold_ms: u64,
    pub history_capacity: usize,
    pub max_slots: usize,
    /// Move focus to each newly created slot
    pub focus_new_slots: bool,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub connect_timeout_ms: u64,
    pub event_queue_capacity: usize,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".into(),
            server_port: 8080,
            server_path: "/".into(),
            client_id: "ground-station".into(),
            vehicle_filter: None,
            stale_threshold_ms: defaults::STALE_THRESHOLD_MS,
            history_capacity: defaults::HISTORY_CAPACITY,
            max_slots: defaults::MAX_SLOTS,
            focus_new_slots: true,
            backoff_initial_ms: defaults::BACKOFF_INITIAL_MS,
            backoff_max_ms: defaults::BACKOFF_MAX_MS,
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            event_queue_capacity: 256,
        }
    }
}

impl StationConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from `path` (extension optional, file optional) plus environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_settings(settings)
    }

    pub fn from_settings(settings: config::Config) -> Result<Self, ConfigError> {
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_host.is_empty() {
            return Err(ConfigError::Invalid("server_host must not be empty".into()));
        }
        if self.server_port == 0 {
            return Err(ConfigError::Invalid("server_port must be non-zero".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be at least 1".into()));
        }
        if self.max_slots == 0 {
            return Err(ConfigError::Invalid("max_slots must be at least 1".into()));
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_capacity must be at least 1".into(),
            ));
        }
        if self.backoff_initial_ms == 0 || self.backoff_initial_ms > self.backoff_max_ms {
            return Err(ConfigError::Invalid(format!(
                "backoff bounds {}..{} ms are invalid",
                self.backoff_initial_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    /// Endpoint of the telemetry stream
    pub fn websocket_url(&self) -> String {
        let path = if self.server_path.starts_with('/') {
            self.server_path.clone()
        } else {
            format!("/{}", self.server_path)
        };
        format!("ws://{}:{}{}", self.server_host, self.server_port, path)
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            reconnect_delay: Duration::from_millis(self.backoff_initial_ms),
            max_reconnect_delay: Duration::from_millis(self.backoff_max_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            event_queue_capacity: self.event_queue_capacity,
            ..Default::default()
        }
    }

    /// Whether events for `vehicle_id` should be tracked
    pub fn accepts_vehicle(&self, vehicle_id: &str) -> bool {
        match self.vehicle_filter.as_deref() {
            Some(filter) if !filter.is_empty() => filter == vehicle_id,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn from_toml(toml: &str) -> Result<StationConfig, ConfigError> {
        let settings = config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        StationConfig::from_settings(settings)
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("").expect("defaults");
        assert_eq!(config, StationConfig::default());
        assert_eq!(config.websocket_url(), "ws://127.0.0.1:8080/");
        assert_eq!(config.stale_threshold_ms, 5000);
        assert_eq!(config.history_capacity, 2000);
        assert_eq!(config.max_slots, 4);
    }

    #[test]
    fn test_overrides() {
        let config = from_toml(
            r#"
            server_host = "10.0.0.5"
            server_port = 9000
            server_path = "ws/telemetry"
            vehicle_filter = "RD001"
            max_slots = 2
            "#,
        )
        .expect("config");

        assert_eq!(config.websocket_url(), "ws://10.0.0.5:9000/ws/telemetry");
        assert_eq!(config.max_slots, 2);
        assert!(config.accepts_vehicle("RD001"));
        assert!(!config.accepts_vehicle("RD002"));
    }

    #[test]
    fn test_no_filter_accepts_everything() {
        let config = StationConfig::default();
        assert!(config.accepts_vehicle("anything"));

        let config = StationConfig {
            vehicle_filter: Some(String::new()),
            ..Default::default()
        };
        assert!(config.accepts_vehicle("anything"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            from_toml("max_slots = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            from_toml("backoff_initial_ms = 20000"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            from_toml("server_port = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            from_toml("server_port = \"not a port\""),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_connection_config() {
        let config = StationConfig {
            backoff_initial_ms: 500,
            backoff_max_ms: 8000,
            ..Default::default()
        };
        let conn = config.connection_config();
        assert_eq!(conn.reconnect_delay, Duration::from_millis(500));
        assert_eq!(conn.max_reconnect_delay, Duration::from_secs(8));
        assert_eq!(conn.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_optional() {
        let config = StationConfig::load_from("config/does-not-exist").expect("config");
        assert!(config.validate().is_ok());
    }
}
