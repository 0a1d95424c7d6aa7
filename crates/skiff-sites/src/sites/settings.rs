//! Application settings.
//!
//! Every field carries a serde default, so settings written by an
//! older build (or a hand-edited file with gaps) load cleanly and new
//! fields pick up their defaults. A missing or corrupt file yields the
//! full default set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

fn default_concurrent_transfers() -> u32 {
    2
}

fn default_overwrite_mode() -> String {
    "ask".to_string()
}

fn default_protocol() -> String {
    "sftp".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_host_key_policy() -> String {
    "auto_add".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSettings {
    #[serde(default = "default_concurrent_transfers")]
    pub concurrent_transfers: u32,
    /// `ask`, `overwrite`, `skip` or `rename`.
    #[serde(default = "default_overwrite_mode")]
    pub overwrite_mode: String,
    #[serde(default = "default_true")]
    pub preserve_timestamps: bool,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Empty means the platform download directory.
    #[serde(default)]
    pub default_download_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    #[serde(default = "default_protocol")]
    pub default_protocol: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_true")]
    pub passive_mode: bool,
    #[serde(default = "default_host_key_policy")]
    pub host_key_policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySettings {
    #[serde(default)]
    pub show_hidden_files: bool,
    #[serde(default = "default_true")]
    pub dirs_first: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            concurrent_transfers: default_concurrent_transfers(),
            overwrite_mode: default_overwrite_mode(),
            preserve_timestamps: true,
            follow_symlinks: false,
            default_download_dir: String::new(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            default_protocol: default_protocol(),
            timeout_secs: default_timeout_secs(),
            keepalive_secs: default_keepalive_secs(),
            max_retries: default_max_retries(),
            passive_mode: true,
            host_key_policy: default_host_key_policy(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_hidden_files: false,
            dirs_first: true,
        }
    }
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skiff")
        .join("settings.json")
}

impl Settings {
    /// Load from the default location.
    pub fn load() -> Self {
        Self::load_from(&default_settings_path())
    }

    /// Load from a given path; missing or unreadable files produce the
    /// defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Settings file {} is unreadable ({}); using defaults", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), String> {
        self.save_to(&default_settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Settings serialisation failed: {}", e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Could not create {}: {}", parent.display(), e))?;
        }
        std::fs::write(path, json).map_err(|e| format!("Could not write {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.transfer.concurrent_transfers, 2);
        assert_eq!(s.transfer.overwrite_mode, "ask");
        assert!(s.transfer.preserve_timestamps);
        assert!(!s.transfer.follow_symlinks);
        assert_eq!(s.connection.default_protocol, "sftp");
        assert_eq!(s.connection.timeout_secs, 30);
        assert!(s.connection.passive_mode);
        assert_eq!(s.connection.host_key_policy, "auto_add");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(s.connection.timeout_secs, 30);
    }

    #[test]
    fn corrupt_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json at all").unwrap();
        let s = Settings::load_from(&path);
        assert_eq!(s.transfer.concurrent_transfers, 2);
    }

    #[test]
    fn partial_file_fills_the_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"connection":{"timeoutSecs":5}}"#).unwrap();

        let s = Settings::load_from(&path);
        assert_eq!(s.connection.timeout_secs, 5);
        assert_eq!(s.connection.keepalive_secs, 60);
        assert_eq!(s.transfer.overwrite_mode, "ask");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut s = Settings::default();
        s.transfer.concurrent_transfers = 5;
        s.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.transfer.concurrent_transfers, 5);
    }
}
