//! Database configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error};
use crate::storage::StorageConfig;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Persistent sled database.
    #[default]
    Sled,
    /// Ephemeral in-memory store.
    Memory,
}

/// Configuration used by [`Database::open`](crate::Database::open).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Backend to open.
    pub backend: Backend,

    /// Sled settings; ignored by the memory backend.
    pub storage: StorageConfig,

    /// Reject registration when the store was created with another schema.
    pub verify_schema_fingerprint: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sled,
            storage: StorageConfig::default(),
            verify_schema_fingerprint: true,
        }
    }
}

impl DatabaseConfig {
    /// Persistent database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            storage: StorageConfig::new(path.as_ref()),
            ..Default::default()
        }
    }

    /// Temporary sled database, removed on drop.
    pub fn temporary() -> Self {
        Self {
            storage: StorageConfig::temporary(),
            ..Default::default()
        }
    }

    /// In-memory database.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory,
            ..Default::default()
        }
    }

    /// Toggle schema fingerprint verification.
    pub fn with_fingerprint_check(mut self, enabled: bool) -> Self {
        self.verify_schema_fingerprint = enabled;
        self
    }

    /// Parse a JSON configuration. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let config = DatabaseConfig::from_json_str(r#"{"backend": "memory"}"#).unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert!(config.verify_schema_fingerprint);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_json_nested_storage() {
        let json = r#"{
            "storage": { "path": "/var/lib/school", "compression": false },
            "verify_schema_fingerprint": false
        }"#;
        let config = DatabaseConfig::from_json_str(json).unwrap();
        assert_eq!(config.backend, Backend::Sled);
        assert_eq!(config.storage.path, std::path::PathBuf::from("/var/lib/school"));
        assert!(!config.storage.compression);
        assert!(!config.verify_schema_fingerprint);
    }

    #[test]
    fn test_invalid_json() {
        let err = DatabaseConfig::from_json_str(r#"{"backend": "postgres"}"#).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ormguard.json");
        std::fs::write(&path, r#"{"backend": "memory"}"#).unwrap();
        assert_eq!(DatabaseConfig::from_json_file(&path).unwrap().backend, Backend::Memory);

        let missing = DatabaseConfig::from_json_file(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
    }

    #[test]
    fn test_constructors() {
        assert!(DatabaseConfig::temporary().storage.temporary);
        assert_eq!(DatabaseConfig::in_memory().backend, Backend::Memory);
        assert!(!DatabaseConfig::in_memory()
            .with_fingerprint_check(false)
            .verify_schema_fingerprint);
    }
}
