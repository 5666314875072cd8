//! Wi-Fi provisioning
//!
//! Commands written to the command characteristic drive scan and connect
//! actions through a [`WifiProvider`](crate::wifi::WifiProvider). Progress is
//! reported through the notifying Status and SSID-list characteristics.

mod controller;
mod handler;
mod layout;
mod validate;

#[cfg(test)]
mod tests;

pub use controller::{ActionTimeouts, CommandController};
pub use handler::{ControllerWriter, WriteTarget};
pub use layout::{Peripheral, PeripheralPaths, PeripheralSettings, DEFAULT_SERVICE_UUID};
pub use validate::{validate_psk, validate_ssid};

use std::fmt;

pub const STATUS_IDLE: &str = "Idle";
pub const STATUS_SCANNING: &str = "Scanning...";
pub const STATUS_SCAN_COMPLETE: &str = "Scan Complete";
pub const STATUS_CONNECTING: &str = "Connecting...";
pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_INVALID_UTF8: &str = "Error: Invalid UTF-8 command";
pub const STATUS_NO_SSID: &str = "Error: No SSID set";
pub const STATUS_SCAN_TIMEOUT: &str = "Error: WiFi scan timed out";
pub const STATUS_CONNECT_TIMEOUT: &str = "Failed: connection timed out";

/// Initial SSID-list value
pub const EMPTY_SSID_LIST: &str = "[]";

/// A decoded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan,
    /// Arguments after `CONNECT` are accepted and ignored
    Connect,
    Unknown(String),
}

impl Command {
    /// Parse a trimmed, case-insensitive command
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let upper = text.to_ascii_uppercase();
        if upper == "SCAN" {
            Command::Scan
        } else if upper == "CONNECT" || upper.starts_with("CONNECT ") {
            Command::Connect
        } else {
            Command::Unknown(text.to_string())
        }
    }
}

/// Connection targets shared by the Set-SSID, Set-PSK and command handlers
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PeripheralState {
    pub target_ssid: String,
    pub target_psk: String,
}

impl fmt::Debug for PeripheralState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralState")
            .field("target_ssid", &self.target_ssid)
            .field("target_psk", &format_args!("<{} chars>", self.target_psk.len()))
            .finish()
    }
}
