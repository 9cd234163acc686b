//! Configuration loading, validation, and management for agentvfs.
//!
//! Loads configuration from `~/.agentvfs/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use agentvfs_core::DEFAULT_DEBOUNCE_MS;
use agentvfs_core::mount::validate_base_directory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.agentvfs/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory for disk-backed mounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Debounce applied to mounts that don't set their own
    #[serde(default = "default_debounce_ms")]
    pub default_debounce_ms: u64,

    /// Crash-restart policy for filesystem servers
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Persistent mounts, each owning one top-level directory
    #[serde(default = "default_mounts")]
    pub mounts: Vec<MountConfig>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_mounts() -> Vec<MountConfig> {
    vec![MountConfig {
        base_directory: "Memories".into(),
        backend: BackendKind::Disk,
        debounce_ms: None,
        readonly: false,
        storage_opts: serde_json::Map::new(),
    }]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Restarts allowed within one window before a scope is given up
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    #[serde(default = "default_restart_window_secs")]
    pub restart_window_secs: u64,
}

fn default_max_restarts() -> u32 {
    3
}
fn default_restart_window_secs() -> u64 {
    5
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            restart_window_secs: default_restart_window_secs(),
        }
    }
}

impl SupervisorConfig {
    pub fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_secs)
    }
}

/// Which storage implementation backs a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Disk,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountConfig {
    pub base_directory: String,

    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Falls back to `default_debounce_ms` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,

    #[serde(default)]
    pub readonly: bool,

    /// Passed through to the backend untouched
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub storage_opts: serde_json::Map<String, serde_json::Value>,
}

fn default_backend() -> BackendKind {
    BackendKind::Disk
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Environment variables override the file:
    /// - `AGENTVFS_DATA_DIR`
    /// - `AGENTVFS_DEBOUNCE_MS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(dir) = std::env::var("AGENTVFS_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(raw) = std::env::var("AGENTVFS_DEBOUNCE_MS") {
            config.default_debounce_ms = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "AGENTVFS_DEBOUNCE_MS must be a non-negative integer, got '{raw}'"
                ))
            })?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentvfs")
    }

    /// Root for disk-backed mounts.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("data"))
    }

    /// Effective debounce for a mount.
    pub fn debounce_for(&self, mount: &MountConfig) -> u64 {
        mount.debounce_ms.unwrap_or(self.default_debounce_ms)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for mount in &self.mounts {
            validate_base_directory(&mount.base_directory)
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

            if !seen.insert(mount.base_directory.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "mount '{}' is declared more than once",
                    mount.base_directory
                )));
            }
        }

        if self.supervisor.restart_window_secs == 0 && self.supervisor.max_restarts > 0 {
            return Err(ConfigError::ValidationError(
                "supervisor.restart_window_secs must be > 0 when restarts are allowed".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            default_debounce_ms: default_debounce_ms(),
            supervisor: SupervisorConfig::default(),
            mounts: default_mounts(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_debounce_ms, 5000);
        assert_eq!(config.supervisor.max_restarts, 3);
        assert_eq!(config.mounts.len(), 1);
        assert_eq!(config.mounts[0].base_directory, "Memories");
        assert_eq!(config.mounts[0].backend, BackendKind::Disk);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_debounce_ms, config.default_debounce_ms);
        assert_eq!(parsed.mounts[0].base_directory, "Memories");
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().mounts.len(), 1);
    }

    #[test]
    fn mount_parsing() {
        let toml_str = r#"
default_debounce_ms = 250

[[mounts]]
base_directory = "Memories"
backend = "disk"

[[mounts]]
base_directory = "Docs"
backend = "memory"
readonly = true
debounce_ms = 0
[mounts.storage_opts]
bucket = "team-docs"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.debounce_for(&config.mounts[0]), 250);

        let docs = &config.mounts[1];
        assert_eq!(docs.backend, BackendKind::Memory);
        assert!(docs.readonly);
        assert_eq!(config.debounce_for(docs), 0);
        assert_eq!(docs.storage_opts["bucket"], "team-docs");
    }

    #[test]
    fn duplicate_mounts_rejected() {
        let toml_str = r#"
[[mounts]]
base_directory = "Memories"

[[mounts]]
base_directory = "Memories"
backend = "memory"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn invalid_base_directory_rejected() {
        let config = AppConfig {
            mounts: vec![MountConfig {
                base_directory: "my.notes".into(),
                backend: BackendKind::Memory,
                debounce_ms: None,
                readonly: false,
                storage_opts: serde_json::Map::new(),
            }],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn nested_base_directory_rejected() {
        let raw = r#"
[[mounts]]
base_directory = "Memories"

[[mounts]]
base_directory = "Memories/Archive"
readonly = true
"#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Memories/Archive"));
    }

    #[test]
    fn unknown_backend_fails_to_parse() {
        let toml_str = r#"
[[mounts]]
base_directory = "Memories"
backend = "s3"
"#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }

    #[test]
    fn load_from_file_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[mounts]]\nbase_directory = \"/bad\"\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn data_dir_defaults_under_config_dir() {
        let config = AppConfig::default();
        assert!(config.data_dir().ends_with(".agentvfs/data"));

        let custom = AppConfig {
            data_dir: Some(PathBuf::from("/srv/agentvfs")),
            ..AppConfig::default()
        };
        assert_eq!(custom.data_dir(), PathBuf::from("/srv/agentvfs"));
    }
}
