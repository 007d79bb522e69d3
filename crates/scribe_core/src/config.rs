//! Queue configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! yields the reference timings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::{ConfigError, QueueError};

/// Top-level queue configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Collection window timings
    pub collection: CollectionConfig,
}

/// Timings for the debounce window that batches near-simultaneous submissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Whether bursts arriving during a running job are batched at all.
    /// When disabled they go straight into the live queue.
    pub enabled: bool,

    /// Quiet period required since the latest arrival before flushing
    pub settle_ms: u64,

    /// Hard cap on how long a window may stay open, measured from opening
    pub max_wait_ms: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_ms: 100,
            max_wait_ms: 200,
        }
    }
}

impl CollectionConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl QueueConfig {
    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| QueueError::Configuration {
                    config_path: path.display().to_string(),
                    field: "queue config file".to_string(),
                    expected: "readable TOML file".to_string(),
                    cause: ConfigError::Io(e.to_string()),
                })?;

        let config = Self::from_toml_str(&content).map_err(|e| match e {
            QueueError::Configuration {
                field,
                expected,
                cause,
                ..
            } => QueueError::Configuration {
                config_path: path.display().to_string(),
                field,
                expected,
                cause,
            },
            other => other,
        })?;

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: QueueConfig =
            toml::from_str(content).map_err(|e| QueueError::Configuration {
                config_path: "<inline>".to_string(),
                field: "content".to_string(),
                expected: "valid queue configuration".to_string(),
                cause: ConfigError::TomlParse(e.to_string()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| QueueError::Configuration {
            config_path: "<inline>".to_string(),
            field: "content".to_string(),
            expected: "serializable configuration".to_string(),
            cause: ConfigError::TomlSerialize(e.to_string()),
        })
    }

    /// Check the timing invariants the collection window relies on
    pub fn validate(&self) -> Result<()> {
        let collection = &self.collection;
        if collection.settle_ms == 0 {
            return Err(QueueError::InvalidConfig {
                field: "collection.settle_ms".to_string(),
                reason: "settle_ms must be greater than zero".to_string(),
            });
        }
        if collection.max_wait_ms < collection.settle_ms {
            return Err(QueueError::InvalidConfig {
                field: "collection.max_wait_ms".to_string(),
                reason: format!(
                    "max_wait_ms ({}) must be at least settle_ms ({})",
                    collection.max_wait_ms, collection.settle_ms
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert!(config.collection.enabled);
        assert_eq!(config.collection.settle(), Duration::from_millis(100));
        assert_eq!(config.collection.max_wait(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = QueueConfig::from_toml_str("").unwrap();
        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = QueueConfig::from_toml_str(
            r#"
            [collection]
            settle_ms = 40
            "#,
        )
        .unwrap();
        assert_eq!(config.collection.settle_ms, 40);
        assert_eq!(config.collection.max_wait_ms, 200);
        assert!(config.collection.enabled);
    }

    #[test]
    fn test_rejects_cap_below_settle() {
        let err = QueueConfig::from_toml_str(
            r#"
            [collection]
            settle_ms = 300
            max_wait_ms = 200
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, QueueError::InvalidConfig { ref field, .. } if field == "collection.max_wait_ms"));
    }

    #[test]
    fn test_rejects_zero_settle() {
        let mut config = QueueConfig::default();
        config.collection.settle_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(QueueError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = QueueConfig::from_toml_str("collection = 5").unwrap_err();
        assert!(matches!(
            err,
            QueueError::Configuration {
                cause: ConfigError::TomlParse(_),
                ..
            }
        ));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = QueueConfig::default();
        config.collection.enabled = false;
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("enabled = false"));
        assert_eq!(QueueConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[tokio::test]
    async fn test_load_from_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[collection]\nmax_wait_ms = \"soon\"").unwrap();

        let err = QueueConfig::load_from_file(file.path()).await.unwrap_err();
        match err {
            QueueError::Configuration { config_path, .. } => {
                assert_eq!(config_path, file.path().display().to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let err = QueueConfig::load_from_file(Path::new("/definitely/not/here.toml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueueError::Configuration {
                cause: ConfigError::Io(_),
                ..
            }
        ));
    }
}
