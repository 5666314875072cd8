use super::validate::{validate_psk, validate_ssid};
use super::{
    Command, PeripheralState, STATUS_CONNECTED, STATUS_CONNECTING, STATUS_CONNECT_TIMEOUT,
    STATUS_INVALID_UTF8, STATUS_NO_SSID, STATUS_SCANNING, STATUS_SCAN_COMPLETE,
    STATUS_SCAN_TIMEOUT,
};
use crate::error::GattResult;
use crate::gatt::Characteristic;
use crate::sync::lock;
use crate::wifi::{WifiError, WifiProvider};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Upper bounds for background actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTimeouts {
    pub scan: Duration,
    pub connect: Duration,
}

impl Default for ActionTimeouts {
    fn default() -> Self {
        Self {
            scan: Duration::from_secs(45),
            connect: Duration::from_secs(60),
        }
    }
}

enum Outcome {
    Scan(Result<Result<Vec<String>, WifiError>, tokio::time::error::Elapsed>),
    Connect(Result<Result<(), WifiError>, tokio::time::error::Elapsed>),
}

struct Inner<P> {
    provider: P,
    status: Arc<Characteristic>,
    ssid_list: Arc<Characteristic>,
    state: Mutex<PeripheralState>,
    timeouts: ActionTimeouts,
    /// Bumped by every command; a background action may only publish its
    /// result while the epoch it started under is still current.
    epoch: Mutex<u64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P> Inner<P> {
    fn set_status(&self, status: &str) {
        if self.status.set_value(status.as_bytes()) {
            info!("Status: {}", status);
        }
    }

    fn finish(&self, epoch: u64, outcome: Outcome) {
        let current = lock(&self.epoch);
        if *current != epoch {
            debug!("Discarding result of superseded action {}", epoch);
            return;
        }
        match outcome {
            Outcome::Scan(Ok(Ok(ssids))) => {
                info!("Scan found {} networks", ssids.len());
                match serde_json::to_string(&ssids) {
                    Ok(json) => {
                        self.ssid_list.set_value(json.into_bytes());
                        self.set_status(STATUS_SCAN_COMPLETE);
                    }
                    Err(e) => self.set_status(&format!("Error: {}", e)),
                }
            }
            Outcome::Scan(Ok(Err(e))) => {
                warn!("Scan failed: {}", e);
                self.set_status(&format!("Error: {}", e));
            }
            Outcome::Scan(Err(_)) => {
                warn!("Scan timed out after {:?}", self.timeouts.scan);
                self.set_status(STATUS_SCAN_TIMEOUT);
            }
            Outcome::Connect(Ok(Ok(()))) => self.set_status(STATUS_CONNECTED),
            Outcome::Connect(Ok(Err(e))) => {
                warn!("Connect failed: {}", e);
                self.set_status(&format!("Failed: {}", e));
            }
            Outcome::Connect(Err(_)) => {
                warn!("Connect timed out after {:?}", self.timeouts.connect);
                self.set_status(STATUS_CONNECT_TIMEOUT);
            }
        }
    }
}

/// Decodes commands and runs scan/connect in the background
pub struct CommandController<P> {
    inner: Arc<Inner<P>>,
    runtime: Handle,
}

impl<P> Clone for CommandController<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            runtime: self.runtime.clone(),
        }
    }
}

impl<P: WifiProvider> CommandController<P> {
    pub fn new(
        provider: P,
        status: Arc<Characteristic>,
        ssid_list: Arc<Characteristic>,
        timeouts: ActionTimeouts,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                status,
                ssid_list,
                state: Mutex::new(PeripheralState::default()),
                timeouts,
                epoch: Mutex::new(0),
                task: Mutex::new(None),
            }),
            runtime,
        }
    }

    /// Raw write to the command characteristic
    pub fn handle_payload(&self, data: &[u8]) -> GattResult<()> {
        match std::str::from_utf8(data) {
            Ok(text) => self.handle_command(text),
            Err(_) => {
                warn!("Command payload is not valid UTF-8 ({} bytes)", data.len());
                let _epoch = self.supersede();
                self.inner.set_status(STATUS_INVALID_UTF8);
            }
        }
        Ok(())
    }

    /// Run one command; returns once the status reflects that it started
    pub fn handle_command(&self, text: &str) {
        let command = Command::parse(text);
        debug!("Command {:?}", command);
        let epoch = self.supersede();
        match command {
            Command::Scan => {
                self.inner.set_status(STATUS_SCANNING);
                let inner = Arc::clone(&self.inner);
                self.spawn(async move {
                    let result = timeout(inner.timeouts.scan, inner.provider.scan()).await;
                    inner.finish(epoch, Outcome::Scan(result));
                });
            }
            Command::Connect => {
                let PeripheralState {
                    target_ssid,
                    target_psk,
                } = self.state();
                if target_ssid.is_empty() {
                    self.inner.set_status(STATUS_NO_SSID);
                    return;
                }
                info!("Connecting to {:?}", target_ssid);
                self.inner.set_status(STATUS_CONNECTING);
                let inner = Arc::clone(&self.inner);
                self.spawn(async move {
                    let result = timeout(
                        inner.timeouts.connect,
                        inner.provider.connect(&target_ssid, &target_psk),
                    )
                    .await;
                    inner.finish(epoch, Outcome::Connect(result));
                });
            }
            Command::Unknown(command) => {
                warn!("Unknown command {:?}", command);
                self.inner
                    .set_status(&format!("Error: Unknown command '{}'", command));
            }
        }
    }

    /// Store the target SSID, leaving the previous one on rejection
    pub fn set_ssid(&self, ssid: &str) -> GattResult<()> {
        if let Err(e) = validate_ssid(ssid) {
            warn!("Rejected SSID ({} bytes): {}", ssid.len(), e);
            return Err(e);
        }
        lock(&self.inner.state).target_ssid = ssid.to_string();
        info!("Target SSID set to {:?}", ssid);
        Ok(())
    }

    /// Store the target PSK, leaving the previous one on rejection
    pub fn set_psk(&self, psk: &str) -> GattResult<()> {
        if let Err(e) = validate_psk(psk) {
            warn!("Rejected PSK ({} chars)", psk.len());
            return Err(e);
        }
        lock(&self.inner.state).target_psk = psk.to_string();
        info!("Target PSK updated ({} chars)", psk.len());
        Ok(())
    }

    pub fn state(&self) -> PeripheralState {
        lock(&self.inner.state).clone()
    }

    pub fn status(&self) -> &Arc<Characteristic> {
        &self.inner.status
    }

    pub fn ssid_list(&self) -> &Arc<Characteristic> {
        &self.inner.ssid_list
    }

    pub fn provider(&self) -> &P {
        &self.inner.provider
    }

    /// Wait for the in-flight action, if any, to finish
    pub async fn settle(&self) {
        let task = lock(&self.inner.task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Background action failed: {}", e);
                }
            }
        }
    }

    /// Abort the in-flight action without touching the status
    pub fn cancel(&self) {
        let _epoch = self.supersede();
    }

    /// Start a new epoch and abort whatever the previous one left running
    fn supersede(&self) -> u64 {
        let mut epoch = lock(&self.inner.epoch);
        *epoch += 1;
        if let Some(task) = lock(&self.inner.task).take() {
            if !task.is_finished() {
                debug!("Aborting in-flight action");
                task.abort();
            }
        }
        *epoch
    }

    fn spawn<F>(&self, action: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(action);
        *lock(&self.inner.task) = Some(handle);
    }
}
