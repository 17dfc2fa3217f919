//! Configuration module for Party
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! # Example
//!
//! ```yaml
//! server:
//!   address: "0.0.0.0:8080"
//!   upload_path: "/upload"
//! upload:
//!   max_bytes: ${PARTY_MAX_BYTES:-33554432}
//!   file_field_name: "file"
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use crate::upload::{UploadLimits, DEFAULT_MAX_MEMORY};

mod loader;

pub use loader::ConfigLoader;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid server address '{}'",
                self.server.address
            )));
        }

        if !self.server.upload_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Upload path '{}' must start with '/'",
                self.server.upload_path
            )));
        }

        if self.upload.max_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_bytes must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
}

fn default_upload_path() -> String {
    "/upload".to_string()
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
    #[serde(default = "default_max_memory")]
    pub max_memory: u64,
    #[serde(default = "default_file_field_name")]
    pub file_field_name: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            max_memory: default_max_memory(),
            file_field_name: default_file_field_name(),
        }
    }
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        UploadLimits::new(config.max_bytes)
            .with_file_field_name(config.file_field_name.clone())
            .with_max_memory(config.max_memory)
    }
}

fn default_max_bytes() -> u64 {
    33554432 // 32MB
}

fn default_max_memory() -> u64 {
    DEFAULT_MAX_MEMORY
}

fn default_file_field_name() -> String {
    crate::DEFAULT_FILE_FIELD_NAME.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                address: "127.0.0.1:8080".into(),
                upload_path: default_upload_path(),
            },
            upload: UploadConfig::default(),
        }
    }

    #[test]
    fn test_default_upload_config() {
        let config = UploadConfig::default();
        assert_eq!(config.max_bytes, 32 << 20);
        assert_eq!(config.max_memory, 32 << 20);
        assert_eq!(config.file_field_name, "file");
    }

    #[test]
    fn test_upload_limits_from_config() {
        let config = UploadConfig {
            max_bytes: 1024,
            max_memory: 512,
            file_field_name: "upload-file".into(),
        };
        let limits = UploadLimits::from(&config);

        assert_eq!(limits.max_bytes, 1024);
        assert_eq!(limits.max_memory, 512);
        assert_eq!(limits.file_field_name, "upload-file");
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());

        let mut config = test_config();
        config.server.address = "invalid".into();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.server.upload_path = "upload".into();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.upload.max_bytes = 0;
        assert!(config.validate().is_err());
    }
}
