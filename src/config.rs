use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::telemetry::SamplerSettings;

const CONFIG_DIR: &str = "teleop-console";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "TELEOP_CONFIG";
const MAX_FRAME_INTERVAL_MS: u64 = 1_000;
const MAX_STATS_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TeleopConfig {
    pub link: LinkConfig,
    pub telemetry: TelemetryConfig,
    pub prompt: PromptConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    pub url: String,
    pub outbound_capacity: usize,
    pub inbound_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws".to_string(),
            outbound_capacity: 1000,
            inbound_capacity: 100,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub frame_interval_ms: u64,
    pub stats_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let sampler = SamplerSettings::default();
        Self {
            enabled: true,
            frame_interval_ms: sampler.frame_interval_ms,
            stats_interval_secs: sampler.stats_interval_secs,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub backend: PromptBackend,
}

/// Where confirmation prompts are shown.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptBackend {
    #[default]
    Window,
    Terminal,
}

impl PromptBackend {
    /// Whether prompts are read from and written to the process' stdio.
    pub fn owns_stdout(self) -> bool {
        matches!(self, PromptBackend::Terminal)
    }
}

impl fmt::Display for PromptBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptBackend::Window => write!(f, "window"),
            PromptBackend::Terminal => write!(f, "terminal"),
        }
    }
}

impl TeleopConfig {
    /// `$TELEOP_CONFIG`, or `config.toml` under the user config directory.
    pub fn default_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Writes the default configuration to `path` unless a file already exists.
    pub async fn ensure_default(path: &Path) -> Result<(), ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if exists {
            debug!("Config file {} present", path.display());
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        TeleopConfig::default().save(path).await
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config: TeleopConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!(
            "Loaded config from {}: link={}, telemetry={}, prompt={}",
            path.display(),
            config.link.url,
            config.telemetry.enabled,
            config.prompt.backend
        );
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await.map_err(io_err)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Rejects values the link and sampler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.outbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "link.outbound_capacity must be at least 1".to_string(),
            ));
        }
        if self.link.inbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "link.inbound_capacity must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_FRAME_INTERVAL_MS).contains(&self.telemetry.frame_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "telemetry.frame_interval_ms must be between 1 and {}, got {}",
                MAX_FRAME_INTERVAL_MS, self.telemetry.frame_interval_ms
            )));
        }
        if !(1..=MAX_STATS_INTERVAL_SECS).contains(&self.telemetry.stats_interval_secs) {
            return Err(ConfigError::Invalid(format!(
                "telemetry.stats_interval_secs must be between 1 and {}, got {}",
                MAX_STATS_INTERVAL_SECS, self.telemetry.stats_interval_secs
            )));
        }
        Ok(())
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            frame_interval_ms: self.telemetry.frame_interval_ms,
            stats_interval_secs: self.telemetry.stats_interval_secs,
        }
    }
}
