//! Client configuration.

use crate::coalescer::CoalescerConfig;
use crate::error::{ClientError, Result};
use crate::pool::PoolConfig;
use crate::profiles::ProfileConflictPolicy;
use crate::relay::RelayConfig;
use crate::settings::default_data_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "NOSTR_POOL_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relays used when no relay list has been saved yet.
    pub relays: Vec<String>,
    /// Period of the reconnect heartbeat.
    pub reconnect_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    pub max_relays: usize,
    pub profile_batch_window_ms: u64,
    pub profile_cooldown_ms: u64,
    pub profile_trailing_flush: bool,
    pub profile_conflict: ProfileConflictPolicy,
    /// Directory for relays.json and profiles.json.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relays: vec![
                "wss://relay.damus.io".to_string(),
                "wss://nos.lol".to_string(),
                "wss://relay.snort.social".to_string(),
            ],
            reconnect_interval_secs: 300,
            connect_timeout_secs: 10,
            publish_timeout_secs: 10,
            max_relays: 16,
            profile_batch_window_ms: 100,
            profile_cooldown_ms: 500,
            profile_trailing_flush: false,
            profile_conflict: ProfileConflictPolicy::LastWrite,
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load from `$NOSTR_POOL_CONFIG` or the platform config directory.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|error| {
            ClientError::Settings(format!("failed to read {}: {}", path.display(), error))
        })?;
        Self::from_toml(&content).map_err(|error| {
            ClientError::Settings(format!("invalid config {}: {}", path.display(), error))
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|error| ClientError::Settings(error.to_string()))
    }

    /// Write the config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|error| ClientError::Settings(error.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Config file location, if one can be determined.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.trim().is_empty()
        {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("nostr-relay-pool").join("config.toml"))
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs.max(1))
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            publish_timeout: Duration::from_secs(self.publish_timeout_secs),
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_relays: self.max_relays,
            relay_config: self.relay_config(),
        }
    }

    pub fn coalescer_config(&self) -> CoalescerConfig {
        CoalescerConfig {
            batch_window: Duration::from_millis(self.profile_batch_window_ms),
            cooldown: Duration::from_millis(self.profile_cooldown_ms),
            trailing_flush: self.profile_trailing_flush,
        }
    }
}
