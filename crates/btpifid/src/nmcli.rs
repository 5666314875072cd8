//! NetworkManager-backed Wi-Fi provider
//!
//! Shells out to `nmcli`. The PSK is passed on the command line because
//! that is the only way `nmcli dev wifi connect` takes it, but it is never
//! logged.

use btpifi::config::WifiConfig;
use btpifi::wifi::normalize_ssids;
use btpifi::{WifiError, WifiProvider};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const NMCLI: &str = "nmcli";
const MAX_STDERR_CHARS: usize = 150;

pub struct NmcliProvider {
    program: PathBuf,
    interface: String,
    rescan_timeout: Duration,
    settle: Duration,
    list_timeout: Duration,
}

impl NmcliProvider {
    pub fn new(interface: impl Into<String>, config: &WifiConfig) -> Self {
        Self {
            program: PathBuf::from(NMCLI),
            interface: interface.into(),
            rescan_timeout: Duration::from_secs(config.rescan_timeout_secs),
            settle: Duration::from_secs(config.scan_settle_secs),
            list_timeout: Duration::from_secs(config.list_timeout_secs),
        }
    }

    #[cfg(test)]
    fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, args: &[String], operation: Operation) -> Result<String, WifiError> {
        run_nmcli(&self.program, args, operation).await
    }
}

/// Which operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Scan,
    Connect,
}

/// Dropping the returned future kills the child.
async fn run_nmcli(
    program: &Path,
    args: &[String],
    operation: Operation,
) -> Result<String, WifiError> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(spawn_error)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(map_failure(&stderr, operation))
    }
}

fn spawn_error(e: io::Error) -> WifiError {
    if e.kind() == io::ErrorKind::NotFound {
        WifiError::Unavailable("nmcli not found".to_string())
    } else {
        WifiError::Unavailable(format!("Failed to run nmcli: {}", e))
    }
}

fn map_failure(stderr: &str, operation: Operation) -> WifiError {
    let stderr = stderr.trim();
    if stderr.to_ascii_lowercase().contains("wifi is disabled") {
        return WifiError::Unavailable("WiFi is disabled".to_string());
    }
    if stderr.contains("NetworkManager is not running") {
        return WifiError::Unavailable("NetworkManager is not running".to_string());
    }
    let excerpt: String = stderr.chars().take(MAX_STDERR_CHARS).collect();
    let message = format!("nmcli failed: {}", excerpt);
    match operation {
        Operation::Scan => WifiError::ScanFailed(message),
        Operation::Connect => WifiError::ConnectFailed(message),
    }
}

/// Terse-mode SSID lines, with `\:` escapes undone
fn parse_ssid_list(stdout: &str) -> Vec<String> {
    normalize_ssids(stdout.lines().map(|line| line.replace("\\:", ":")))
}

fn scan_list_args() -> Vec<String> {
    ["-t", "-f", "SSID", "dev", "wifi", "list"]
        .map(String::from)
        .to_vec()
}

fn connect_args(ssid: &str, psk: &str, interface: &str) -> Vec<String> {
    let mut args: Vec<String> = ["dev", "wifi", "connect", ssid]
        .map(String::from)
        .to_vec();
    if !psk.is_empty() {
        args.push("password".to_string());
        args.push(psk.to_string());
    }
    args.push("ifname".to_string());
    args.push(interface.to_string());
    args
}

impl WifiProvider for NmcliProvider {
    async fn scan(&self) -> Result<Vec<String>, WifiError> {
        let rescan = ["dev", "wifi", "rescan"].map(String::from);
        debug!("nmcli rescan (timeout {:?})", self.rescan_timeout);
        match timeout(self.rescan_timeout, self.run(&rescan, Operation::Scan)).await {
            Err(_) => return Err(WifiError::Timeout("WiFi rescan".to_string())),
            Ok(Err(e @ WifiError::Unavailable(_))) => return Err(e),
            // A rescan refused while one is already running still leaves
            // fresh results behind.
            Ok(Err(e)) => warn!("Rescan failed, listing cached results: {}", e),
            Ok(Ok(_)) => {}
        }

        sleep(self.settle).await;

        let stdout = timeout(self.list_timeout, self.run(&scan_list_args(), Operation::Scan))
            .await
            .map_err(|_| WifiError::Timeout("WiFi list".to_string()))??;
        let ssids = parse_ssid_list(&stdout);
        info!("nmcli reported {} networks", ssids.len());
        Ok(ssids)
    }

    async fn connect(&self, ssid: &str, psk: &str) -> Result<(), WifiError> {
        info!(
            "nmcli connecting to {:?} on {} ({})",
            ssid,
            self.interface,
            if psk.is_empty() { "open" } else { "with passphrase" }
        );
        let args = connect_args(ssid, psk, &self.interface);
        self.run(&args, Operation::Connect).await?;
        info!("Connected to {:?}", ssid);
        Ok(())
    }
}
