//! Daemon configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file or a
//! partial one is fine.

use crate::path::ObjectPath;
use crate::provisioning::{ActionTimeouts, PeripheralSettings};
use crate::uuid::{Uuid, UuidParseError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/btpifi/btpifid.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid service UUID: {0}")]
    Uuid(#[from] UuidParseError),

    #[error("Invalid application path: {0}")]
    Path(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub peripheral: PeripheralConfig,
    pub wifi: WifiConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PeripheralConfig {
    pub app_path: String,
    pub service_uuid: String,
    /// Explicit advertised name; derived from the MAC address when unset
    pub device_name: Option<String>,
    pub name_prefix: String,
    pub default_name: String,
    pub wifi_interface: String,
    pub appearance: u16,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            app_path: "/com/btpifi".to_string(),
            service_uuid: "133934e0-01f5-4054-a88f-0136e064c49e".to_string(),
            device_name: None,
            name_prefix: "BtPiFi".to_string(),
            default_name: "BtPiFi-Setup".to_string(),
            wifi_interface: "wlan0".to_string(),
            appearance: 0x0340,
        }
    }
}

/// Timeouts are in seconds
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WifiConfig {
    /// Whole scan action, as seen by the controller
    pub scan_timeout_secs: u64,
    /// Whole connect action, as seen by the controller
    pub connect_timeout_secs: u64,
    pub rescan_timeout_secs: u64,
    pub scan_settle_secs: u64,
    pub list_timeout_secs: u64,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 45,
            connect_timeout_secs: 60,
            rescan_timeout_secs: 15,
            scan_settle_secs: 8,
            list_timeout_secs: 10,
        }
    }
}

impl WifiConfig {
    pub fn action_timeouts(&self) -> ActionTimeouts {
        ActionTimeouts {
            scan: Duration::from_secs(self.scan_timeout_secs),
            connect: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                info!("Loaded config from {}", path.display());
                Self::from_toml_str(&content)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Advertised name: explicit override, else `<prefix>-XXXX` from the
    /// interface MAC address, else the default name
    pub fn resolve_device_name(&self) -> String {
        let peripheral = &self.peripheral;
        if let Some(name) = peripheral.device_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        let address = Path::new("/sys/class/net")
            .join(&peripheral.wifi_interface)
            .join("address");
        match fs::read_to_string(&address) {
            Ok(mac) => device_name_from_mac(&peripheral.name_prefix, &mac)
                .unwrap_or_else(|| peripheral.default_name.clone()),
            Err(e) => {
                debug!("Cannot read {}: {}", address.display(), e);
                peripheral.default_name.clone()
            }
        }
    }

    /// Settings for building the peripheral advertised as `local_name`
    pub fn peripheral_settings(&self, local_name: String) -> Result<PeripheralSettings, ConfigError> {
        let peripheral = &self.peripheral;
        let app_path = ObjectPath::new(peripheral.app_path.as_str())
            .map_err(|_| ConfigError::Path(peripheral.app_path.clone()))?;
        if app_path == ObjectPath::root() {
            return Err(ConfigError::Path(peripheral.app_path.clone()));
        }
        let service_uuid: Uuid = peripheral.service_uuid.parse()?;
        Ok(PeripheralSettings {
            app_path,
            service_uuid,
            local_name,
            appearance: peripheral.appearance,
            timeouts: self.wifi.action_timeouts(),
        })
    }
}

/// `<prefix>-XXXX` from the last two bytes of a `aa:bb:cc:dd:ee:ff` address
pub fn device_name_from_mac(prefix: &str, mac: &str) -> Option<String> {
    let digits: String = mac.trim().chars().filter(|c| *c != ':').collect();
    if digits.len() != 12 || hex::decode(&digits).is_err() {
        return None;
    }
    Some(format!("{}-{}", prefix, digits[8..].to_ascii_uppercase()))
}
