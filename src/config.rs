//! Application configuration
//!
//! Read from a TOML file. Every field has a default, so a missing file or a
//! partial one is fine:
//!
//! ```toml
//! data_dir = "/home/me/.local/share/bookshelf"
//!
//! [sync]
//! debounce_ms = 3000
//! settings_policy = "remote_wins"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::LibraryStorage;
use crate::sync::SyncConfig;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "BOOKSHELF_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Data directory not found")]
    DataDirNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Library location; the platform data directory when unset
    pub data_dir: Option<PathBuf>,
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Default config file path: `$BOOKSHELF_CONFIG`, else
    /// `<config dir>/bookshelf/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("bookshelf").join("config.toml"))
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from the default location, or defaults if there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Resolved library directory
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => LibraryStorage::default_data_dir().map_err(|_| ConfigError::DataDirNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SettingsPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync.debounce_ms, 3_000);
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            data_dir = "/srv/books"

            [sync]
            debounce_ms = 1500
            settings_policy = "newer_wins"
            descriptor_file = "progress.json"
            "#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/srv/books"));
        assert_eq!(config.sync.debounce_ms, 1_500);
        assert_eq!(config.sync.settings_policy, SettingsPolicy::NewerWins);
        assert_eq!(config.sync.descriptor_file, "progress.json");
        assert_eq!(config.sync.status_display_ms, 3_000);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\ndebounce_ms = \"soon\"").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
