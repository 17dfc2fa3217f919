//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR_NAME}` and `${VAR_NAME:-default}`
    ///
    /// Unset variables without a default keep their placeholder.
    fn expand_env_vars(content: &str) -> String {
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var pattern is valid");

        re.replace_all(content, |cap: &regex_lite::Captures<'_>| {
            match std::env::var(&cap[1]) {
                Ok(value) => value,
                Err(_) => cap
                    .get(2)
                    .map(|default| default.as_str().to_string())
                    .unwrap_or_else(|| cap[0].to_string()),
            }
        })
        .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("PARTY_TEST_VAR", "test_value");
        let content = "key: ${PARTY_TEST_VAR}";
        let expanded = ConfigLoader::expand_env_vars(content);
        assert_eq!(expanded, "key: test_value");
        std::env::remove_var("PARTY_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_default() {
        let expanded = ConfigLoader::expand_env_vars("max: ${PARTY_UNSET_VAR:-1024}");
        assert_eq!(expanded, "max: 1024");

        let expanded = ConfigLoader::expand_env_vars("max: ${PARTY_UNSET_VAR}");
        assert_eq!(expanded, "max: ${PARTY_UNSET_VAR}");
    }

    #[test]
    fn test_from_yaml() {
        let config = ConfigLoader::from_yaml(
            r#"
server:
  address: "127.0.0.1:0"
upload:
  max_bytes: ${PARTY_UNSET_MAX:-2048}
  file_field_name: "upload-file"
"#,
        )
        .unwrap();

        assert_eq!(config.server.upload_path, "/upload");
        assert_eq!(config.upload.max_bytes, 2048);
        assert_eq!(config.upload.file_field_name, "upload-file");
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let result = ConfigLoader::from_yaml(
            r#"
server:
  address: "127.0.0.1:0"
upload:
  max_bytes: 0
"#,
        );
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
