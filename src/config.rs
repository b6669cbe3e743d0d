// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Session settings.
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Adapter to use, e.g. "hci0". The default adapter when unset.
    pub adapter: Option<String>,

    /// RFCOMM channel used for listening and connecting.
    pub rfcomm_channel: u8,

    /// Size of the read buffer for incoming data.
    pub read_buffer_size: usize,

    /// Address of a device to connect to at start-up.
    pub default_device: Option<String>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            rfcomm_channel: 1,
            read_buffer_size: 1024,
            default_device: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the notification channel between link and session.
    pub notification_capacity: usize,

    /// Number of log lines shown in the tray menu.
    pub visible_log_lines: usize,

    /// How long a notice stays in the tray tooltip, in seconds.
    pub notice_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            notification_capacity: 32,
            visible_log_lines: 10,
            notice_seconds: 4,
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arduino-remote")
            .join("config.toml")
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from file, writing the defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bluetooth.rfcomm_channel, 1);
        assert_eq!(config.bluetooth.read_buffer_size, 1024);
        assert_eq!(config.bluetooth.default_device, None);
        assert_eq!(config.session.notification_capacity, 32);
        assert_eq!(config.session.notice_seconds, 4);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [bluetooth]
            default_device = "98:D3:31:F5:2A:10"
            "#,
        )
        .unwrap();

        assert_eq!(config.bluetooth.default_device.as_deref(), Some("98:D3:31:F5:2A:10"));
        assert_eq!(config.bluetooth.rfcomm_channel, 1);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.bluetooth.adapter = Some("hci1".to_string());
        config.bluetooth.rfcomm_channel = 3;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }
}
