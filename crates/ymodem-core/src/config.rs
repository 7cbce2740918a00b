//! Receiver tuning: per-read timeout budgets and retry ceilings.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Retry limit `{0}` must be at least 1")]
    ZeroRetryLimit(&'static str),
}

/// Timeout budget, in milliseconds, for each kind of read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Header byte. Longer, the sender may not have started yet.
    pub header_ms: u32,
    /// Sequence number and its complement.
    pub sequence_ms: u32,
    /// Each 128-byte payload chunk.
    pub payload_ms: u32,
    /// CRC trailer.
    pub crc_ms: u32,
    /// Quiet window that ends a flow-control drain.
    pub drain_ms: u32,
    /// Second EOT after the first one was NAKed.
    pub eot_ms: u32,
    /// Read after sending cancel.
    pub cancel_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            header_ms: 1000,
            sequence_ms: 300,
            payload_ms: 1000,
            crc_ms: 1000,
            drain_ms: 300,
            eot_ms: 1000,
            cancel_ms: 1000,
        }
    }
}

/// Configuration for a receive session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub timeouts: Timeouts,
    /// Consecutive header timeouts tolerated before cancelling.
    pub header_retry_limit: u32,
    /// Consecutive framing/integrity failures tolerated before cancelling.
    pub block_retry_limit: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            header_retry_limit: 25,
            block_retry_limit: 5,
        }
    }
}

impl ReceiverConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ReceiverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A zero ceiling would cancel before the first attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.header_retry_limit == 0 {
            return Err(ConfigError::ZeroRetryLimit("header_retry_limit"));
        }
        if self.block_retry_limit == 0 {
            return Err(ConfigError::ZeroRetryLimit("block_retry_limit"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReceiverConfig::default();
        assert_eq!(config.timeouts.header_ms, 1000);
        assert_eq!(config.timeouts.sequence_ms, 300);
        assert_eq!(config.header_retry_limit, 25);
        assert_eq!(config.block_retry_limit, 5);
        assert!(config.header_retry_limit > config.block_retry_limit);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReceiverConfig::from_toml(
            r#"
            block_retry_limit = 8

            [timeouts]
            header_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.block_retry_limit, 8);
        assert_eq!(config.header_retry_limit, 25);
        assert_eq!(config.timeouts.header_ms, 5000);
        assert_eq!(config.timeouts.payload_ms, 1000);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = ReceiverConfig::default();
        config.timeouts.drain_ms = 50;
        let text = config.to_toml().unwrap();
        assert_eq!(ReceiverConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ymodem.toml");
        let mut config = ReceiverConfig::default();
        config.header_retry_limit = 10;
        config.timeouts.header_ms = 5000;

        config.save_to_file(&path).unwrap();
        assert_eq!(ReceiverConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_limit_rejected() {
        let err = ReceiverConfig::from_toml("header_retry_limit = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroRetryLimit("header_retry_limit")));
    }
}
