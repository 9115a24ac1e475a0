//! Host settings
//!
//! Read once at startup from a JSON file. Every field has a default, so a
//! partial file (or no file at all) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// The reloadable module. Relative paths are resolved by the binary.
    pub module_path: PathBuf,
    /// Load a uniquely named copy of the module instead of the file itself.
    /// When off, the file is loaded in place once and reloads still go
    /// through per-attempt copies.
    pub shadow_copy: bool,
    /// Directory for shadow copies. System temp dir when unset.
    pub shadow_dir: Option<PathBuf>,
    pub persistent_arena_capacity: usize,
    pub persistent_arena_growable: bool,
    pub scratch_slot_count: usize,
    pub scratch_slot_capacity: usize,
    /// How often to check the module for changes. 0 checks every frame.
    pub reload_poll_interval_ms: u64,
    pub window: WindowSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl HostConfig {
    /// Read settings from `path`, falling back to defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "settings loaded");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.module_path.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("module_path is empty".into()));
        }
        if self.scratch_slot_count == 0 {
            return Err(SettingsError::Invalid(
                "scratch_slot_count must be at least 1".into(),
            ));
        }
        if self.scratch_slot_capacity == 0 {
            return Err(SettingsError::Invalid(
                "scratch_slot_capacity must be non-zero".into(),
            ));
        }
        if self.persistent_arena_capacity == 0 {
            return Err(SettingsError::Invalid(
                "persistent_arena_capacity must be non-zero".into(),
            ));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(SettingsError::Invalid(format!(
                "window size {}x{} has a zero dimension",
                self.window.width, self.window.height
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn reload_poll_interval(&self) -> Duration {
        Duration::from_millis(self.reload_poll_interval_ms)
    }

    /// Platform file name of a dynamic library called `name`.
    pub fn dylib_file_name(name: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            name,
            std::env::consts::DLL_SUFFIX
        ))
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            module_path: Self::dylib_file_name("kiln_demo"),
            shadow_copy: true,
            shadow_dir: None,
            persistent_arena_capacity: 64 * MIB,
            persistent_arena_growable: true,
            scratch_slot_count: 4,
            scratch_slot_capacity: 16 * MIB,
            reload_poll_interval_ms: 250,
            window: WindowSettings::default(),
        }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "kiln".into(),
            width: 1280,
            height: 720,
            fullscreen: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HostConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scratch_slot_count, 4);
        assert_eq!(config.reload_poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig::load(dir.path().join("kiln.json")).unwrap();
        assert_eq!(config, HostConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.json");
        std::fs::write(
            &path,
            r#"{ "scratch_slot_count": 8, "window": { "title": "sandbox" } }"#,
        )
        .unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert_eq!(config.scratch_slot_count, 8);
        assert_eq!(config.window.title, "sandbox");
        assert_eq!(config.window.width, 1280);
        assert!(config.shadow_copy);
    }

    #[test]
    fn test_zero_slots_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.json");
        std::fs::write(&path, r#"{ "scratch_slot_count": 0 }"#).unwrap();

        assert!(matches!(
            HostConfig::load(&path),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(HostConfig::load(&path), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.json");
        let config = HostConfig {
            reload_poll_interval_ms: 0,
            shadow_copy: false,
            ..HostConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(HostConfig::load(&path).unwrap(), config);
    }
}
