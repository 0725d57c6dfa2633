use crate::streaming::StreamConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use stepwise_shared::TransportConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Engine settings, loadable from TOML. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub bpm: f64,
    /// Samples rendered per provider call.
    pub chunk_size: usize,
    /// Audio queued ahead of the device.
    pub buffered_samples: usize,
    pub master_gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: stepwise_shared::DEFAULT_SAMPLE_RATE,
            bpm: stepwise_shared::DEFAULT_BPM,
            chunk_size: 512,
            buffered_samples: 4096,
            master_gain: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive".to_string()));
        }
        if !(self.bpm > 0.0) || !self.bpm.is_finite() {
            return Err(ConfigError::Invalid(format!("bpm must be positive, got {}", self.bpm)));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be positive".to_string()));
        }
        if self.chunk_size > self.buffered_samples {
            return Err(ConfigError::Invalid(format!(
                "chunk_size ({}) exceeds buffered_samples ({})",
                self.chunk_size, self.buffered_samples
            )));
        }
        if !self.master_gain.is_finite() || self.master_gain < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "master_gain must be non-negative, got {}",
                self.master_gain
            )));
        }
        Ok(())
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::new(self.sample_rate, self.bpm)
    }

    pub fn stream(&self) -> StreamConfig {
        StreamConfig {
            chunk_size: self.chunk_size,
            buffered_samples: self.buffered_samples,
            poll_interval: Duration::from_millis(2),
        }
    }
}
