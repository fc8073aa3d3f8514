pub mod connection;

pub use connection::{ConnectionDescriptor, Endpoint};

use crate::error::{Result, StowageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level Stowage configuration stored as TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StowageConfig {
    #[serde(default)]
    pub stowage: StowageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StowageSettings {
    /// Connection descriptor. Usually supplied via `STOWAGE_CONNECTION` instead,
    /// since it carries credentials.
    #[serde(default)]
    pub connection: Option<String>,
    /// Container used when a command does not name one.
    #[serde(default)]
    pub container: Option<String>,
    /// Upper bound on pages fetched by a single listing. Unbounded when unset.
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Page size used by the filesystem backend.
    #[serde(default = "default_local_page_size")]
    pub local_page_size: usize,
}

impl Default for StowageSettings {
    fn default() -> Self {
        Self {
            connection: None,
            container: None,
            max_pages: None,
            local_page_size: default_local_page_size(),
        }
    }
}

/// Matches the service-side default of 5000 results per segment.
fn default_local_page_size() -> usize {
    5000
}

impl StowageConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StowageError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| StowageError::TomlDe(e.to_string()))?;
        if config.stowage.local_page_size == 0 {
            return Err(StowageError::config("local_page_size must be at least 1"));
        }
        Ok(config)
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(StowageError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| StowageError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the config file path: `<base_dir>/stowage.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("stowage.toml")
    }

    /// Resolve the default stowage home directory: `~/.stowage`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".stowage"))
            .ok_or_else(|| StowageError::config("Cannot determine home directory"))
    }

    /// Parse the configured connection descriptor, if any.
    pub fn connection(&self) -> Result<Option<ConnectionDescriptor>> {
        self.stowage
            .connection
            .as_deref()
            .map(ConnectionDescriptor::parse)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn roundtrip_config() {
        let tmp = TempDir::new().unwrap();
        let path = StowageConfig::default_path(tmp.path());
        let mut config = StowageConfig::default();
        config.stowage.container = Some("quickstartblobs".to_string());
        config.stowage.max_pages = Some(250);
        config.save(&path).unwrap();

        let loaded = StowageConfig::load(&path).unwrap();
        assert_eq!(loaded.stowage.container.as_deref(), Some("quickstartblobs"));
        assert_eq!(loaded.stowage.max_pages, Some(250));
        assert_eq!(loaded.stowage.local_page_size, 5000);
    }

    #[test]
    fn load_nonexistent_returns_error() {
        let result = StowageConfig::load(Path::new("/nonexistent/stowage.toml"));
        assert!(matches!(result, Err(StowageError::ConfigNotFound(_))));
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let config = StowageConfig::load_or_default(Path::new("/nonexistent/stowage.toml")).unwrap();
        assert!(config.stowage.connection.is_none());
        assert!(config.stowage.max_pages.is_none());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stowage.toml");
        std::fs::write(&path, "").unwrap();
        let config = StowageConfig::load(&path).unwrap();
        assert_eq!(config.stowage.local_page_size, 5000);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("stowage.toml");
        std::fs::write(&path, "[stowage]\nlocal_page_size = 0\n").unwrap();
        assert!(matches!(
            StowageConfig::load(&path),
            Err(StowageError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_connection_surfaces_as_configuration_error() {
        let mut config = StowageConfig::default();
        config.stowage.connection = Some("AccountName=acct".to_string());
        assert!(matches!(
            config.connection(),
            Err(StowageError::Configuration(_))
        ));

        config.stowage.connection = Some("UseLocalStorage=true;LocalRoot=/srv/blobs".to_string());
        assert!(matches!(
            config.connection().unwrap(),
            Some(ConnectionDescriptor::Local { .. })
        ));
    }
}
