//! Player configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sources::DEFAULT_CHUNK_COUNT;
use crate::{CptvError, Result};

/// Tuning for a [`CptvPlayer`](crate::CptvPlayer) and its decode worker.
///
/// ```rust
/// use cptv_player::DecoderConfig;
///
/// let config = DecoderConfig::from_yaml_str("max_chunk_size: 65536\n").unwrap();
/// assert_eq!(config.max_chunk_size, Some(65536));
/// assert_eq!(config.request_capacity, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct DecoderConfig {
    /// Depth of the request and response channels
    pub request_capacity: usize,
    /// How long to wait for the worker's ready signal
    pub ready_timeout_ms: u64,
    /// Upper bound on buffered chunk size; `None` splits into `default_chunk_count`
    pub max_chunk_size: Option<usize>,
    /// Number of chunks a resident buffer is split into by default
    pub default_chunk_count: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            request_capacity: 32,
            ready_timeout_ms: 5000,
            max_chunk_size: None,
            default_chunk_count: DEFAULT_CHUNK_COUNT,
        }
    }
}

impl DecoderConfig {
    /// Parse and validate a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DecoderConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_capacity == 0 {
            return Err(CptvError::config("request_capacity must be greater than 0"));
        }
        if self.default_chunk_count == 0 {
            return Err(CptvError::config("default_chunk_count must be greater than 0"));
        }
        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Set the maximum buffered chunk size.
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = Some(max_chunk_size);
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = DecoderConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, DecoderConfig::default());
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let yaml = "request_capacity: 4\nready_timeout_ms: 250\n";
        let config = DecoderConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.request_capacity, 4);
        assert_eq!(config.ready_timeout(), Duration::from_millis(250));
        assert_eq!(config.default_chunk_count, DEFAULT_CHUNK_COUNT);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = DecoderConfig::from_yaml_str("request_capacity: 0").unwrap_err();
        assert!(matches!(err, CptvError::Config { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = DecoderConfig::from_yaml_str("request_capacity: [").unwrap_err();
        assert!(matches!(err, CptvError::Config { .. }));
    }
}
