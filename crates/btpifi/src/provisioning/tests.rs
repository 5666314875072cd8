//! Provisioning scenarios driven through the bus-facing dispatch path

use super::*;
use crate::application::{Application, MethodCall, Reply};
use crate::error::{GattError, GattResult};
use crate::gatt::{PropertyValue, GATT_CHARACTERISTIC_IFACE, GATT_DESCRIPTOR_IFACE, GATT_SERVICE_IFACE};
use crate::path::ObjectPath;
use crate::transport::LocalBus;
use crate::wifi::{WifiError, WifiProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted Wi-Fi provider
struct MockWifi {
    scan_result: Mutex<Result<Vec<String>, WifiError>>,
    connect_result: Mutex<Result<(), WifiError>>,
    scan_delay: Duration,
    connect_delay: Duration,
    scans: AtomicUsize,
    connects: Mutex<Vec<(String, String)>>,
}

impl MockWifi {
    fn new() -> Self {
        Self {
            scan_result: Mutex::new(Ok(vec!["Cafe".into(), "HomeNet".into()])),
            connect_result: Mutex::new(Ok(())),
            scan_delay: Duration::ZERO,
            connect_delay: Duration::ZERO,
            scans: AtomicUsize::new(0),
            connects: Mutex::new(Vec::new()),
        }
    }

    fn scan_fails(self, error: WifiError) -> Self {
        *self.scan_result.lock().unwrap() = Err(error);
        self
    }

    fn connect_fails(self, error: WifiError) -> Self {
        *self.connect_result.lock().unwrap() = Err(error);
        self
    }

    fn slow_scan(mut self, delay: Duration) -> Self {
        self.scan_delay = delay;
        self
    }

    fn slow_connect(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }
}

impl WifiProvider for MockWifi {
    async fn scan(&self) -> Result<Vec<String>, WifiError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.scan_delay).await;
        self.scan_result.lock().unwrap().clone()
    }

    async fn connect(&self, ssid: &str, psk: &str) -> Result<(), WifiError> {
        self.connects
            .lock()
            .unwrap()
            .push((ssid.to_string(), psk.to_string()));
        tokio::time::sleep(self.connect_delay).await;
        self.connect_result.lock().unwrap().clone()
    }
}

struct Fixture {
    app: Application<LocalBus, MockWifi>,
    bus: Arc<LocalBus>,
    paths: PeripheralPaths,
}

impl Fixture {
    fn start(wifi: MockWifi) -> Self {
        let settings = PeripheralSettings {
            timeouts: ActionTimeouts {
                scan: Duration::from_secs(30),
                connect: Duration::from_secs(30),
            },
            ..PeripheralSettings::default()
        };
        let peripheral =
            Peripheral::build(&settings, wifi, tokio::runtime::Handle::current()).unwrap();
        let paths = peripheral.paths.clone();
        let bus = Arc::new(LocalBus::new());
        let mut app = Application::new(bus.clone(), peripheral);
        app.start().unwrap();
        Fixture { app, bus, paths }
    }

    fn controller(&self) -> &CommandController<MockWifi> {
        &self.app.peripheral().controller
    }

    fn write(&self, path: &ObjectPath, value: &[u8]) -> GattResult<Reply> {
        self.app.dispatch(
            path,
            MethodCall::WriteValue {
                offset: 0,
                value: value.to_vec(),
            },
        )
    }

    fn read(&self, path: &ObjectPath) -> GattResult<Reply> {
        self.app.dispatch(path, MethodCall::ReadValue { offset: 0 })
    }

    fn read_text(&self, path: &ObjectPath) -> String {
        match self.read(path) {
            Ok(Reply::Value(value)) => String::from_utf8(value).unwrap(),
            other => panic!("unexpected read result {:?}", other),
        }
    }

    fn subscribe(&self, path: &ObjectPath) {
        assert_eq!(
            self.app.dispatch(path, MethodCall::StartNotify),
            Ok(Reply::Empty)
        );
    }

    fn notified(&self, path: &ObjectPath) -> Vec<String> {
        self.bus
            .value_notifications(path)
            .into_iter()
            .map(|value| String::from_utf8(value).unwrap())
            .collect()
    }

    async fn command(&self, command: &str) {
        assert_eq!(self.write(&self.paths.command, command.as_bytes()), Ok(Reply::Empty));
        self.controller().settle().await;
    }
}

#[tokio::test]
async fn test_scan_publishes_ssid_list() {
    let fx = Fixture::start(MockWifi::new());
    fx.subscribe(&fx.paths.status);
    fx.subscribe(&fx.paths.ssid_list);
    assert_eq!(fx.read_text(&fx.paths.status), STATUS_IDLE);
    assert_eq!(fx.read_text(&fx.paths.ssid_list), EMPTY_SSID_LIST);

    fx.command("SCAN").await;

    assert_eq!(
        fx.notified(&fx.paths.status),
        [STATUS_SCANNING, STATUS_SCAN_COMPLETE]
    );
    assert_eq!(fx.notified(&fx.paths.ssid_list), [r#"["Cafe","HomeNet"]"#]);
    assert_eq!(fx.read_text(&fx.paths.ssid_list), r#"["Cafe","HomeNet"]"#);
    assert_eq!(fx.controller().provider().scans.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_repeated_scan_only_notifies_changes() {
    let fx = Fixture::start(MockWifi::new());
    fx.subscribe(&fx.paths.ssid_list);
    fx.command("scan").await;
    fx.command("  Scan ").await;
    // Same list twice: only the first scan changes the value.
    assert_eq!(fx.notified(&fx.paths.ssid_list).len(), 1);
}

#[tokio::test]
async fn test_set_credentials_and_connect() {
    let fx = Fixture::start(MockWifi::new());
    fx.subscribe(&fx.paths.status);
    assert_eq!(fx.write(&fx.paths.set_ssid, b"Ericnet"), Ok(Reply::Empty));
    assert_eq!(fx.write(&fx.paths.set_psk, b"goodluck"), Ok(Reply::Empty));

    fx.command("CONNECT").await;

    assert_eq!(
        fx.notified(&fx.paths.status),
        [STATUS_CONNECTING, STATUS_CONNECTED]
    );
    assert_eq!(
        *fx.controller().provider().connects.lock().unwrap(),
        [("Ericnet".to_string(), "goodluck".to_string())]
    );
}

#[tokio::test]
async fn test_connect_arguments_are_ignored() {
    let fx = Fixture::start(MockWifi::new());
    fx.write(&fx.paths.set_ssid, b"HomeNet").unwrap();
    fx.command("connect OtherNet").await;
    assert_eq!(fx.read_text(&fx.paths.status), STATUS_CONNECTED);
    // Open network: the PSK is left empty.
    assert_eq!(
        *fx.controller().provider().connects.lock().unwrap(),
        [("HomeNet".to_string(), String::new())]
    );
}

#[tokio::test]
async fn test_connect_failure_reported_in_status() {
    let wifi = MockWifi::new().connect_fails(WifiError::ConnectFailed(
        "Secrets were required, but not provided".into(),
    ));
    let fx = Fixture::start(wifi);
    fx.write(&fx.paths.set_ssid, b"HomeNet").unwrap();
    fx.command("CONNECT").await;
    assert_eq!(
        fx.read_text(&fx.paths.status),
        "Failed: Secrets were required, but not provided"
    );
}

#[tokio::test]
async fn test_connect_without_ssid() {
    let fx = Fixture::start(MockWifi::new());
    fx.command("CONNECT").await;
    assert_eq!(fx.read_text(&fx.paths.status), STATUS_NO_SSID);
    assert!(fx.controller().provider().connects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_ssid_keeps_previous_value() {
    let fx = Fixture::start(MockWifi::new());
    fx.write(&fx.paths.set_ssid, b"HomeNet").unwrap();

    let too_long = "x".repeat(40);
    assert_eq!(
        fx.write(&fx.paths.set_ssid, too_long.as_bytes()),
        Err(GattError::InvalidValueLength(
            "SSID too long (max 32 bytes)".into()
        ))
    );
    assert_eq!(fx.controller().state().target_ssid, "HomeNet");
}

#[tokio::test]
async fn test_invalid_psk_rejected() {
    let fx = Fixture::start(MockWifi::new());
    fx.write(&fx.paths.set_psk, b"s3cretpass").unwrap();
    assert_eq!(
        fx.write(&fx.paths.set_psk, b"short"),
        Err(GattError::InvalidValueLength("Invalid PSK length".into()))
    );
    assert!(matches!(
        fx.write(&fx.paths.set_psk, &[0xff, 0xfe, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46]),
        Err(GattError::InvalidValueLength(_))
    ));
    assert_eq!(fx.controller().state().target_psk, "s3cretpass");
}

#[tokio::test]
async fn test_permission_rejections() {
    let fx = Fixture::start(MockWifi::new());
    assert_eq!(fx.read(&fx.paths.command), Err(GattError::ReadNotPermitted));
    assert_eq!(fx.read(&fx.paths.set_psk), Err(GattError::ReadNotPermitted));
    assert_eq!(
        fx.write(&fx.paths.status, b"Connected"),
        Err(GattError::WriteNotPermitted)
    );
    assert_eq!(
        fx.app.dispatch(&fx.paths.set_ssid, MethodCall::StartNotify),
        Err(GattError::NotifyNotSupported)
    );
    let desc = fx.paths.status.child("desc0").unwrap();
    assert_eq!(fx.write(&desc, b"x"), Err(GattError::WriteNotPermitted));
    assert_eq!(fx.read_text(&fx.paths.status), STATUS_IDLE);
}

#[tokio::test]
async fn test_discovery_is_stable_and_complete() {
    let fx = Fixture::start(MockWifi::new());
    let root = fx.paths.root.clone();
    let first = fx.app.dispatch(&root, MethodCall::GetManagedObjects).unwrap();
    let second = fx.app.dispatch(&root, MethodCall::GetManagedObjects).unwrap();
    assert_eq!(first, second);

    let Reply::ManagedObjects(objects) = first else {
        panic!("expected managed objects");
    };
    assert_eq!(objects.len(), 11);
    let mut seen: Vec<_> = objects.paths().cloned().collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 11);

    for (path, interfaces) in objects.iter() {
        assert_eq!(interfaces.len(), 1);
        let expected = if path == &fx.paths.service {
            GATT_SERVICE_IFACE
        } else if path.as_str().ends_with("desc0") {
            GATT_DESCRIPTOR_IFACE
        } else {
            GATT_CHARACTERISTIC_IFACE
        };
        assert_eq!(interfaces[0].interface(), expected, "{}", path);
    }

    let command = objects.get(&fx.paths.command).unwrap();
    assert_eq!(
        command[0].get("UUID").unwrap(),
        &PropertyValue::from("133934e1-01f5-4054-a88f-0136e064c49e")
    );
}

#[tokio::test]
async fn test_unknown_command_sets_error_status() {
    let fx = Fixture::start(MockWifi::new());
    fx.command("  reboot ").await;
    assert_eq!(
        fx.read_text(&fx.paths.status),
        "Error: Unknown command 'reboot'"
    );
}

#[tokio::test]
async fn test_invalid_utf8_command_is_not_a_fault() {
    let fx = Fixture::start(MockWifi::new());
    assert_eq!(fx.write(&fx.paths.command, &[0xc3, 0x28]), Ok(Reply::Empty));
    assert_eq!(fx.read_text(&fx.paths.status), STATUS_INVALID_UTF8);
}

#[tokio::test]
async fn test_scan_failure_leaves_list_unchanged() {
    let fx = Fixture::start(
        MockWifi::new().scan_fails(WifiError::Unavailable("WiFi is disabled".into())),
    );
    fx.command("SCAN").await;
    assert_eq!(fx.read_text(&fx.paths.status), "Error: WiFi is disabled");
    assert_eq!(fx.read_text(&fx.paths.ssid_list), EMPTY_SSID_LIST);
}

#[tokio::test(start_paused = true)]
async fn test_scan_timeout() {
    let fx = Fixture::start(MockWifi::new().slow_scan(Duration::from_secs(120)));
    fx.command("SCAN").await;
    assert_eq!(fx.read_text(&fx.paths.status), STATUS_SCAN_TIMEOUT);
    assert_eq!(fx.read_text(&fx.paths.ssid_list), EMPTY_SSID_LIST);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let fx = Fixture::start(MockWifi::new().slow_connect(Duration::from_secs(120)));
    fx.write(&fx.paths.set_ssid, b"HomeNet").unwrap();
    fx.command("CONNECT").await;
    assert_eq!(fx.read_text(&fx.paths.status), STATUS_CONNECT_TIMEOUT);
}

#[tokio::test(start_paused = true)]
async fn test_new_command_supersedes_in_flight_scan() {
    let fx = Fixture::start(MockWifi::new().slow_scan(Duration::from_secs(10)));
    fx.subscribe(&fx.paths.status);
    fx.write(&fx.paths.set_ssid, b"HomeNet").unwrap();

    fx.write(&fx.paths.command, b"SCAN").unwrap();
    // Let the scan task start and park on its sleep.
    tokio::task::yield_now().await;
    fx.command("CONNECT").await;
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(
        fx.notified(&fx.paths.status),
        [STATUS_SCANNING, STATUS_CONNECTING, STATUS_CONNECTED]
    );
    assert_eq!(fx.read_text(&fx.paths.ssid_list), EMPTY_SSID_LIST);
}

#[tokio::test]
async fn test_stop_cancels_and_unexports() {
    let mut fx = Fixture::start(MockWifi::new().slow_scan(Duration::from_secs(3600)));
    fx.write(&fx.paths.command, b"SCAN").unwrap();
    fx.app.stop().unwrap();
    fx.controller().settle().await;
    assert_eq!(fx.controller().status().value(), STATUS_SCANNING.as_bytes());
    assert!(fx.bus.exported_paths().is_empty());
}
