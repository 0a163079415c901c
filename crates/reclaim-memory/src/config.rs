//! Engine configuration.
//!
//! Loaded from TOML or JSON; every field has a default so an empty file is
//! a valid configuration.

use crate::batch::MAX_TRANSFER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `android.os.Process.FIRST_APPLICATION_UID`
pub const FIRST_APPLICATION_UID: u32 = 10000;

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the process filesystem
    pub proc_root: PathBuf,
    /// Processes owned by this uid or above are left to per-app policy
    pub first_application_uid: u32,
    /// Ranges per `process_madvise` call
    pub max_transfer: usize,
    /// Pid the system sweep must never touch. Defaults to our own.
    pub self_pid: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            first_application_uid: FIRST_APPLICATION_UID,
            max_transfer: MAX_TRANSFER,
            self_pid: None,
        }
    }
}

impl EngineConfig {
    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_str_with(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => Self::from_toml(content),
            ConfigFormat::Json => Self::from_json(content),
        }
    }

    /// Load a file, picking the format from its extension.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path).ok_or(ConfigError::UnsupportedFormat)?;
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_str_with(&content, format)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// The pid excluded from system sweeps.
    pub fn self_pid(&self) -> u32 {
        self.self_pid.unwrap_or_else(std::process::id)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transfer == 0 || self.max_transfer > MAX_TRANSFER {
            return Err(ConfigError::InvalidTransferLimit(self.max_transfer));
        }
        if self.proc_root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyProcRoot);
        }
        Ok(())
    }
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("max_transfer must be between 1 and 1024, got {0}")]
    InvalidTransferLimit(usize),

    #[error("proc_root must not be empty")]
    EmptyProcRoot,

    #[error("Unsupported config format")]
    UnsupportedFormat,

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();

        assert_eq!(config.proc_root, PathBuf::from("/proc"));
        assert_eq!(config.first_application_uid, 10000);
        assert_eq!(config.max_transfer, 1024);
        assert_eq!(config.self_pid(), std::process::id());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"max_transfer": 16, "self_pid": 1}"#).unwrap();
        assert_eq!(config.max_transfer, 16);
        assert_eq!(config.self_pid(), 1);
        assert_eq!(config.first_application_uid, 10000);
    }

    #[test]
    fn test_rejects_bad_transfer_limit() {
        assert!(matches!(
            EngineConfig::from_toml("max_transfer = 0"),
            Err(ConfigError::InvalidTransferLimit(0))
        ));
        assert!(matches!(
            EngineConfig::from_toml("max_transfer = 4096"),
            Err(ConfigError::InvalidTransferLimit(4096))
        ));
        assert!(matches!(
            EngineConfig::from_toml("proc_root = \"\""),
            Err(ConfigError::EmptyProcRoot)
        ));
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = EngineConfig {
            proc_root: PathBuf::from("/tmp/proc"),
            first_application_uid: 5000,
            max_transfer: 8,
            self_pid: Some(3),
        };
        let parsed = EngineConfig::from_toml(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempdir().unwrap();

        let toml_path = dir.path().join("reclaim.toml");
        std::fs::write(&toml_path, "first_application_uid = 2000\n").unwrap();
        assert_eq!(EngineConfig::from_file(&toml_path).unwrap().first_application_uid, 2000);

        let yaml_path = dir.path().join("reclaim.yaml");
        std::fs::write(&yaml_path, "").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&yaml_path),
            Err(ConfigError::UnsupportedFormat)
        ));
    }
}
