use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use taskwatch_core::ChannelSettings;
use taskwatch_engine::{ApiSettings, EngineSettings};
use taskwatch_logging::{tw_info, tw_warn};
use thiserror::Error;

pub(crate) const DEFAULT_CONFIG_FILENAME: &str = "taskwatch.ron";

/// Client settings read from a RON file. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ClientConfig {
    pub(crate) channel_url: String,
    pub(crate) api_url: String,
    pub(crate) reconnect_interval_ms: u64,
    pub(crate) max_reconnect_attempts: u32,
    pub(crate) heartbeat_interval_ms: u64,
    pub(crate) simulation_interval_ms: u64,
    pub(crate) request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            channel_url: "ws://localhost:8000".to_string(),
            api_url: "http://localhost:8000".to_string(),
            reconnect_interval_ms: 3_000,
            max_reconnect_attempts: 5,
            heartbeat_interval_ms: 30_000,
            simulation_interval_ms: 2_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    pub(crate) fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            max_reconnect_attempts: self.max_reconnect_attempts,
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            simulation_interval: Duration::from_millis(self.simulation_interval_ms),
        }
    }

    pub(crate) fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            channel: self.channel_settings(),
            ..EngineSettings::default()
        }
    }

    pub(crate) fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_url.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..ApiSettings::default()
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

/// Reads `path`. `Ok(None)` when the file does not exist.
pub(crate) fn read_config(path: &Path) -> Result<Option<ClientConfig>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    ron::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Like [`read_config`], but any problem falls back to defaults.
pub(crate) fn load_config(path: &Path) -> ClientConfig {
    match read_config(path) {
        Ok(Some(config)) => {
            tw_info!("Loaded config from {:?}", path);
            config
        }
        Ok(None) => ClientConfig::default(),
        Err(err) => {
            tw_warn!("{}; using defaults", err);
            ClientConfig::default()
        }
    }
}
