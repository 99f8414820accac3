//! Engine configuration
//!
//! Tunables shared by the signature builder, the delta computer and the
//! streaming sessions. Loadable from JSON.

use crate::signature::layout::{derive_block_size_clamped, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default size of the read buffer used when scanning new data (64KB)
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default cap on a single literal run held in memory (1MB)
pub const DEFAULT_MAX_LITERAL_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed block size; derived from the input length when unset
    pub block_size: Option<usize>,
    /// Lower clamp for derived block sizes
    pub min_block_size: usize,
    /// Upper clamp for derived block sizes
    pub max_block_size: usize,
    /// Bytes requested from the new-data reader per refill
    pub read_buffer_size: usize,
    /// Longest literal run buffered before it is emitted
    pub max_literal_size: usize,
    /// Verify the whole-stream digest when a patch session finishes
    pub verify_checksum: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: None,
            min_block_size: MIN_BLOCK_SIZE,
            max_block_size: MAX_BLOCK_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_literal_size: DEFAULT_MAX_LITERAL_SIZE,
            verify_checksum: true,
        }
    }
}

impl EngineConfig {
    /// Config with a fixed block size
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size: Some(block_size),
            ..Default::default()
        }
    }

    /// Block size to use for an input of `total_length` bytes
    pub fn block_size_for(&self, total_length: u64) -> usize {
        match self.block_size {
            Some(size) => size,
            None => derive_block_size_clamped(
                total_length,
                self.min_block_size,
                self.max_block_size,
            ),
        }
    }

    /// Parse a config from a JSON document; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check the config for values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == Some(0) {
            return Err(ConfigError::Invalid("block_size must be non-zero".into()));
        }
        if self.min_block_size == 0 || self.min_block_size > self.max_block_size {
            return Err(ConfigError::Invalid(format!(
                "block size clamps out of order: min {} max {}",
                self.min_block_size, self.max_block_size
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "read_buffer_size must be non-zero".into(),
            ));
        }
        if self.max_literal_size == 0 {
            return Err(ConfigError::Invalid(
                "max_literal_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_size, None);
        assert!(config.verify_checksum);
    }

    #[test]
    fn test_fixed_block_size_overrides_heuristic() {
        let config = EngineConfig::with_block_size(16);
        assert_eq!(config.block_size_for(0), 16);
        assert_eq!(config.block_size_for(1 << 40), 16);
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{ "block_size": 1024 }"#).unwrap();
        assert_eq!(config.block_size, Some(1024));
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.max_literal_size, DEFAULT_MAX_LITERAL_SIZE);
    }

    #[test]
    fn test_from_json_rejects_zero_literal_cap() {
        let result = EngineConfig::from_json(r#"{ "max_literal_size": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_json_rejects_zero_block_size() {
        let result = EngineConfig::from_json(r#"{ "block_size": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "verify_checksum": false, "min_block_size": 64 }}"#).unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert!(!config.verify_checksum);
        assert_eq!(config.min_block_size, 64);
    }
}
