//! Configuration management
//!
//! Values are layered: built-in defaults, then an optional file, then
//! `CALLKIT__<SECTION>__<KEY>` environment variables.

use crate::domain::signaling::IceServer;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub coordinator: CoordinatorConfig,
    pub signaling: SignalingConfig,
    pub push: PushConfig,
    pub callback: CallbackConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Ring timeout used when the call data carries no `duration`
    pub default_ring_timeout_ms: u64,
}

impl CoordinatorConfig {
    pub fn default_ring_timeout(&self) -> Duration {
        Duration::from_millis(self.default_ring_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Servers used when neither the host nor the push payload supplies any
    pub ice_servers: Vec<IceServer>,
}

/// What to do when push-token registration fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenErrorPolicy {
    /// Publish a `token-error` event
    Emit,
    /// Log only
    Swallow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub token_error_policy: TokenErrorPolicy,
    /// JSON file for persisted settings; in-memory when unset
    pub settings_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Upper bound for a decline callback request
    pub timeout_ms: u64,
}

impl CallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `callkit_bridge=debug`
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            signaling: SignalingConfig::default(),
            push: PushConfig::default(),
            callback: CallbackConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_ring_timeout_ms: 30_000,
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::new("stun:stun.l.google.com:19302")],
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            token_error_policy: TokenErrorPolicy::Emit,
            settings_path: None,
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then `path` if it exists, then the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder
            .add_source(
                config::Environment::with_prefix("CALLKIT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse a TOML document; missing sections keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(
            config.coordinator.default_ring_timeout(),
            Duration::from_secs(30)
        );
        assert_eq!(config.push.token_error_policy, TokenErrorPolicy::Emit);
        assert_eq!(config.signaling.ice_servers.len(), 1);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.callback.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = Config::from_toml_str(
            r#"
            [coordinator]
            default_ring_timeout_ms = 45000

            [push]
            token_error_policy = "swallow"

            [[signaling.ice_servers]]
            urls = ["turn:turn.example.com:3478"]
            username = "user"
            credential = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.coordinator.default_ring_timeout_ms, 45_000);
        assert_eq!(config.push.token_error_policy, TokenErrorPolicy::Swallow);
        assert_eq!(config.signaling.ice_servers[0].username.as_deref(), Some("user"));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = Config::load(Some("does-not-exist.toml")).unwrap();
        assert_eq!(config.coordinator, CoordinatorConfig::default());
    }
}
