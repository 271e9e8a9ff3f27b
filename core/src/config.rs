//! Store configuration (TOML)
//!
//! Every field has a default, so an empty document (or a missing file with
//! [`StoreConfig::load_or_default`]) yields a working configuration.
//!
//! ```toml
//! separator = "/"
//! warn_on_underflow = false
//!
//! [folder]
//! collapsed = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::FolderSettings;

/// Errors loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Store-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Joins folder and leaf names into paths (default: ".")
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Settings for folders that declare none
    #[serde(default)]
    pub folder: FolderSettings,
    /// Log a warning when a path is disposed more often than added
    /// (default: true)
    #[serde(default = "default_true")]
    pub warn_on_underflow: bool,
}

fn default_separator() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            folder: FolderSettings::default(),
            warn_on_underflow: default_true(),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Like [`StoreConfig::load`], falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default store config ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Serialize as pretty TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.separator.is_empty() {
            return Err(ConfigError::Invalid("separator must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.separator, ".");
        assert!(!config.folder.collapsed);
        assert!(config.warn_on_underflow);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = StoreConfig::from_toml_str(
            r#"
separator = "/"

[folder]
collapsed = true
"#,
        )
        .unwrap();
        assert_eq!(config.separator, "/");
        assert!(config.folder.collapsed);
        assert!(config.warn_on_underflow);
    }

    #[test]
    fn test_empty_separator_rejected() {
        assert!(matches!(
            StoreConfig::from_toml_str("separator = \"\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            StoreConfig::from_toml_str("separator = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");

        let config = StoreConfig {
            separator: "/".to_string(),
            folder: FolderSettings::collapsed(true),
            warn_on_underflow: false,
        };
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(StoreConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::load_or_default(&dir.path().join("missing.toml"));
        assert_eq!(config, StoreConfig::default());
    }
}
