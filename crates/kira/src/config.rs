//! Relay configuration loaded from a TOML file.
//!
//! The file is created with defaults on first run. Missing or empty
//! fields are filled in and the completed file is written back, so the
//! operator always sees every knob.
//!
//! ```toml
//! [connection]
//! local_address = "0.0.0.0:19132"
//! remote_address = "play.nethergames.org:19132"
//!
//! [relay]
//! chat_prefix = "§f"
//! queue_capacity = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use kira_session::ProximityPolicy;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Everything the relay reads from its configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub connection: ConnectionConfig,
    pub relay: RelayConfig,
}

/// Where to listen and where to relay to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Address game clients connect to.
    pub local_address: String,
    /// Upstream game server.
    pub remote_address: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            local_address: "0.0.0.0:19132".to_string(),
            remote_address: "play.nethergames.org:19132".to_string(),
        }
    }
}

/// Per-session tuning shared by every relayed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Prepended to every plain chat line the client sends upstream.
    pub chat_prefix: String,
    /// Capacity of the client → server hand-off queue.
    pub queue_capacity: usize,
    /// Bound on the upstream dial and on each handshake stage, in seconds.
    pub dial_timeout_secs: u64,
    /// Radar radius in blocks.
    pub radar_radius: f32,
    /// Minimum distance change, in blocks, between radar alerts.
    pub radar_threshold: f32,
    /// Health below which low-health effects are applied.
    pub low_health_threshold: f32,
    /// Duration of low-health effects, in ticks.
    pub low_health_effect_ticks: i32,
    /// Largest distance covered by one teleport step, in blocks.
    pub teleport_step: f32,
    /// Pause between teleport steps, in milliseconds.
    pub teleport_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chat_prefix: "§f".to_string(),
            queue_capacity: 1000,
            dial_timeout_secs: 60,
            radar_radius: 80.0,
            radar_threshold: 1.0,
            low_health_threshold: 10.0,
            low_health_effect_ticks: 600,
            teleport_step: 0.5,
            teleport_interval_ms: 20,
        }
    }
}

impl RelayConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn teleport_interval(&self) -> Duration {
        Duration::from_millis(self.teleport_interval_ms)
    }

    pub fn proximity_policy(&self) -> ProximityPolicy {
        ProximityPolicy {
            radius: self.radar_radius,
            threshold: self.radar_threshold,
        }
    }

    /// Replaces values the relay cannot run with by their defaults.
    ///
    /// - `queue_capacity` and `dial_timeout_secs` must be non-zero.
    /// - `teleport_step`, `radar_radius` must be positive and finite.
    /// - `radar_threshold` must be non-negative and finite.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.queue_capacity == 0 {
            warn!(default = defaults.queue_capacity, "queue_capacity is 0, using default");
            self.queue_capacity = defaults.queue_capacity;
        }
        if self.dial_timeout_secs == 0 {
            warn!(default = defaults.dial_timeout_secs, "dial_timeout_secs is 0, using default");
            self.dial_timeout_secs = defaults.dial_timeout_secs;
        }
        if !(self.teleport_step.is_finite() && self.teleport_step > 0.0) {
            warn!(value = self.teleport_step, "teleport_step out of range, using default");
            self.teleport_step = defaults.teleport_step;
        }
        if !(self.radar_radius.is_finite() && self.radar_radius > 0.0) {
            warn!(value = self.radar_radius, "radar_radius out of range, using default");
            self.radar_radius = defaults.radar_radius;
        }
        if !(self.radar_threshold.is_finite() && self.radar_threshold >= 0.0) {
            warn!(value = self.radar_threshold, "radar_threshold out of range, using default");
            self.radar_threshold = defaults.radar_threshold;
        }
        self
    }
}

impl ProxyConfig {
    /// Reads the config at `path`, creating it with defaults if missing.
    ///
    /// Empty addresses are replaced by the defaults and the completed
    /// configuration is written back to `path`.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(io_err)?;
            Self::from_toml(&raw)?
        } else {
            info!(path = %path.display(), "config file not found, creating one with defaults");
            Self::default()
        };

        std::fs::write(path, config.to_toml()?).map_err(io_err)?;
        Ok(config)
    }

    /// Parses a config document and fills in anything left empty.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        Ok(config.filled())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn filled(mut self) -> Self {
        let defaults = ConnectionConfig::default();
        if self.connection.local_address.trim().is_empty() {
            self.connection.local_address = defaults.local_address;
        }
        if self.connection.remote_address.trim().is_empty() {
            self.connection.remote_address = defaults.remote_address;
        }
        self.relay = self.relay.validated();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = ProxyConfig::from_toml("").unwrap();
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.connection.local_address, "0.0.0.0:19132");
        assert_eq!(config.connection.remote_address, "play.nethergames.org:19132");
    }

    #[test]
    fn test_empty_addresses_are_filled() {
        let raw = r#"
            [connection]
            local_address = ""
            remote_address = "mc.example.org:19132"
        "#;
        let config = ProxyConfig::from_toml(raw).unwrap();
        assert_eq!(config.connection.local_address, "0.0.0.0:19132");
        assert_eq!(config.connection.remote_address, "mc.example.org:19132");
    }

    #[test]
    fn test_relay_section_is_partial() {
        let raw = r#"
            [relay]
            queue_capacity = 16
            chat_prefix = ""
        "#;
        let config = ProxyConfig::from_toml(raw).unwrap();
        assert_eq!(config.relay.queue_capacity, 16);
        assert_eq!(config.relay.chat_prefix, "");
        assert_eq!(config.relay.teleport_step, 0.5);
    }

    #[test]
    fn test_validated_replaces_unusable_values() {
        let relay = RelayConfig {
            queue_capacity: 0,
            teleport_step: -1.0,
            radar_threshold: f32::NAN,
            ..RelayConfig::default()
        }
        .validated();
        assert_eq!(relay, RelayConfig::default());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        let err = ProxyConfig::from_toml("[connection\nlocal_address = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_or_create_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = ProxyConfig::load_or_create(&path).unwrap();
        assert_eq!(created, ProxyConfig::default());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("remote_address"));

        std::fs::write(&path, "[connection]\nremote_address = \"\"\n").unwrap();
        let reloaded = ProxyConfig::load_or_create(&path).unwrap();
        assert_eq!(reloaded.connection.remote_address, "play.nethergames.org:19132");
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("play.nethergames.org:19132"));
    }

    #[test]
    fn test_policy_and_durations() {
        let relay = RelayConfig::default();
        assert_eq!(relay.dial_timeout(), Duration::from_secs(60));
        assert_eq!(relay.teleport_interval(), Duration::from_millis(20));
        assert_eq!(relay.proximity_policy(), ProximityPolicy::default());
    }
}
