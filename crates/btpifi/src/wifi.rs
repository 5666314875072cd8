//! Wi-Fi collaborator
//!
//! Scanning and joining networks is delegated to a [`WifiProvider`]. The
//! daemon ships one backed by `nmcli`; tests use scripted providers.

use std::collections::BTreeSet;
use std::future::Future;
use thiserror::Error;

/// Failure reported by a Wi-Fi provider.
///
/// The display form is what ends up in the status characteristic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WifiError {
    #[error("{0}")]
    ScanFailed(String),

    #[error("{0}")]
    ConnectFailed(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0} timed out")]
    Timeout(String),
}

/// Scans for and joins Wi-Fi networks
pub trait WifiProvider: Send + Sync + 'static {
    /// Visible SSIDs, de-duplicated and sorted
    fn scan(&self) -> impl Future<Output = Result<Vec<String>, WifiError>> + Send;

    /// Join `ssid`; an empty `psk` means an open network
    fn connect(&self, ssid: &str, psk: &str)
        -> impl Future<Output = Result<(), WifiError>> + Send;
}

/// Trim, drop blank lines, de-duplicate and sort raw SSID lines
pub fn normalize_ssids<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| line.as_ref().trim().to_string())
        .filter(|ssid| !ssid.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
