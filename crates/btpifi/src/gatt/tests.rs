//! Unit tests for the GATT object model

use super::*;
use crate::error::GattError;
use crate::path::ObjectPath;
use crate::transport::{NotificationSink, TransportError};
use crate::uuid::Uuid;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// Sink that records every property change it is handed
#[derive(Default)]
struct RecordingSink {
    changes: Mutex<Vec<(ObjectPath, PropertyBag)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    fn values(&self) -> Vec<Vec<u8>> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, bag)| bag.get("Value").ok()?.as_bytes().map(<[u8]>::to_vec))
            .collect()
    }

    fn notifying(&self) -> Vec<bool> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, bag)| bag.get("Notifying").ok()?.as_bool())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn properties_changed(
        &self,
        path: &ObjectPath,
        changed: &PropertyBag,
    ) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Delivery("bus gone".into()));
        }
        self.changes
            .lock()
            .unwrap()
            .push((path.clone(), changed.clone()));
        Ok(())
    }
}

fn service_path() -> ObjectPath {
    ObjectPath::new("/com/btpifi/service0").unwrap()
}

fn chrc_path() -> ObjectPath {
    ObjectPath::new("/com/btpifi/service0/char1").unwrap()
}

fn base_uuid() -> Uuid {
    "133934e0-01f5-4054-a88f-0136e064c49e".parse().unwrap()
}

fn characteristic(flags: CharacteristicFlags) -> (Arc<Characteristic>, Arc<RecordingSink>) {
    let chrc = Arc::new(
        Characteristic::new(chrc_path(), base_uuid().with_role_digit(2), service_path(), flags)
            .with_value(b"Idle".to_vec()),
    );
    let sink = Arc::new(RecordingSink::default());
    chrc.attach_sink(sink.clone());
    (chrc, sink)
}

#[test]
fn test_read_requires_read_flag() {
    let (readable, _) = characteristic(CharacteristicFlags::READ);
    assert_eq!(readable.read_value(0).unwrap(), b"Idle");
    assert_eq!(readable.read_value(1).unwrap(), b"dle");
    assert_eq!(readable.read_value(9), Err(GattError::InvalidOffset(9)));

    let (write_only, _) = characteristic(CharacteristicFlags::WRITE);
    assert_eq!(write_only.read_value(0), Err(GattError::ReadNotPermitted));
}

#[test]
fn test_write_requires_a_write_flag() {
    let (chrc, _) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY);
    assert_eq!(chrc.write_value(0, b"x"), Err(GattError::WriteNotPermitted));
    assert_eq!(chrc.value(), b"Idle");

    let (wwr, _) = characteristic(CharacteristicFlags::WRITE_WITHOUT_RESPONSE);
    assert_eq!(wwr.write_value(0, b"SCAN"), Ok(()));
}

#[test]
fn test_write_then_read_round_trip() {
    let (chrc, _) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::WRITE);
    chrc.write_value(0, b"hello").unwrap();
    assert_eq!(chrc.read_value(0).unwrap(), b"hello");
    chrc.write_value(2, b"LP").unwrap();
    assert_eq!(chrc.read_value(0).unwrap(), b"heLP");
}

#[test]
fn test_start_notify_twice_emits_once() {
    let (chrc, sink) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY);
    assert!(!chrc.notifying());
    chrc.start_notify().unwrap();
    chrc.start_notify().unwrap();
    assert!(chrc.notifying());
    assert_eq!(sink.notifying(), vec![true]);

    chrc.stop_notify().unwrap();
    chrc.stop_notify().unwrap();
    assert_eq!(sink.notifying(), vec![true, false]);
}

#[test]
fn test_notify_without_flag_not_supported() {
    let (chrc, sink) = characteristic(CharacteristicFlags::READ);
    assert_eq!(chrc.start_notify(), Err(GattError::NotifyNotSupported));
    assert_eq!(chrc.stop_notify(), Err(GattError::NotifyNotSupported));
    assert!(sink.notifying().is_empty());
}

#[test]
fn test_update_value_reports_change() {
    let (chrc, _) = characteristic(CharacteristicFlags::READ);
    assert!(chrc.update_value(b"Scanning...".to_vec()));
    assert!(!chrc.update_value(b"Scanning...".to_vec()));
    assert_eq!(chrc.value(), b"Scanning...");
}

#[test]
fn test_send_notification_only_while_notifying() {
    let (chrc, sink) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY);
    assert!(!chrc.send_notification());
    assert!(sink.values().is_empty());

    chrc.start_notify().unwrap();
    assert!(chrc.send_notification());
    assert_eq!(sink.values(), vec![b"Idle".to_vec()]);
}

#[test]
fn test_transport_failure_is_absorbed() {
    let (chrc, sink) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY);
    chrc.start_notify().unwrap();
    sink.fail.store(true, Ordering::SeqCst);
    assert!(!chrc.send_notification());
    // The value still changes even though the signal was lost.
    assert!(chrc.set_value(b"Connected".to_vec()));
    assert_eq!(chrc.value(), b"Connected");
}

#[test]
fn test_set_value_notifies_only_on_change() {
    let (chrc, sink) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY);
    chrc.start_notify().unwrap();
    assert!(chrc.set_value(b"Scanning...".to_vec()));
    assert!(!chrc.set_value(b"Scanning...".to_vec()));
    assert!(chrc.set_value(b"Scan Complete".to_vec()));
    assert_eq!(
        sink.values(),
        vec![b"Scanning...".to_vec(), b"Scan Complete".to_vec()]
    );
}

#[test]
fn test_write_handler_receives_payload() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let chrc = Characteristic::new(
        ObjectPath::new("/com/btpifi/service0/char0").unwrap(),
        base_uuid().with_role_digit(1),
        service_path(),
        CharacteristicFlags::WRITE | CharacteristicFlags::WRITE_WITHOUT_RESPONSE,
    )
    .with_write_handler(Arc::new(move |data: &[u8]| {
        recorder.lock().unwrap().push(data.to_vec());
        Ok::<(), GattError>(())
    }));

    chrc.write_value(0, b"SCAN").unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![b"SCAN".to_vec()]);
    // Handled writes are not stored.
    assert!(chrc.value().is_empty());
}

#[test]
fn test_computed_value_source() {
    let chrc = Characteristic::new(chrc_path(), base_uuid(), service_path(), CharacteristicFlags::READ)
        .with_provider(Arc::new(|| b"computed".to_vec()));
    assert_eq!(chrc.read_value(4).unwrap(), b"uted");
}

#[test]
fn test_computed_value_may_inspect_its_characteristic() {
    let me: Arc<OnceLock<Weak<Characteristic>>> = Arc::default();
    let provider = {
        let me = Arc::clone(&me);
        move || {
            let live = me
                .get()
                .and_then(Weak::upgrade)
                .is_some_and(|chrc| chrc.notifying());
            if live { b"live".to_vec() } else { b"idle".to_vec() }
        }
    };
    let chrc = Arc::new(
        Characteristic::new(
            chrc_path(),
            base_uuid(),
            service_path(),
            CharacteristicFlags::READ | CharacteristicFlags::NOTIFY,
        )
        .with_provider(Arc::new(provider)),
    );
    me.set(Arc::downgrade(&chrc)).unwrap();
    let sink = Arc::new(RecordingSink::default());
    chrc.attach_sink(sink.clone());

    assert_eq!(chrc.read_value(0).unwrap(), b"idle");
    chrc.start_notify().unwrap();
    assert!(chrc.send_notification());
    assert!(chrc.set_value(b"ignored".to_vec()));
    assert_eq!(sink.values(), [b"live".to_vec(), b"live".to_vec()]);
}

#[test]
fn test_characteristic_properties_follow_flags() {
    let (notifying, _) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::NOTIFY);
    let names: Vec<_> = notifying.properties().names().collect();
    assert_eq!(names, ["UUID", "Service", "Flags", "Descriptors", "Value", "Notifying"]);
    assert_eq!(
        notifying.properties().get("Flags").unwrap(),
        &PropertyValue::Strings(vec!["read".into(), "notify".into()])
    );

    let (write_only, _) = characteristic(CharacteristicFlags::WRITE);
    let names: Vec<_> = write_only.properties().names().collect();
    assert_eq!(names, ["UUID", "Service", "Flags", "Descriptors"]);
}

#[test]
fn test_properties_interface_checks() {
    let (chrc, _) = characteristic(CharacteristicFlags::READ);
    assert_eq!(
        chrc.get_property(GATT_CHARACTERISTIC_IFACE, "Service").unwrap(),
        PropertyValue::Path(service_path())
    );
    assert_eq!(
        chrc.get_property(GATT_SERVICE_IFACE, "UUID"),
        Err(GattError::InterfaceNotFound(GATT_SERVICE_IFACE.into()))
    );
    assert_eq!(
        chrc.set_property(GATT_CHARACTERISTIC_IFACE, "Value", PropertyValue::Bytes(vec![])),
        Err(GattError::ReadOnly("Value".into()))
    );
}

#[test]
fn test_descriptor_flags() {
    let desc = Descriptor::user_description(&chrc_path(), "Status").unwrap();
    assert_eq!(desc.path().as_str(), "/com/btpifi/service0/char1/desc0");
    assert_eq!(desc.read_value(0).unwrap(), b"Status");
    assert_eq!(desc.write_value(0, b"x"), Err(GattError::WriteNotPermitted));

    let writable = Descriptor::new(
        chrc_path().child("desc1").unwrap(),
        Uuid::from_u16(0x2902),
        chrc_path(),
        DescriptorFlags::WRITE,
        Vec::new(),
    );
    writable.write_value(0, &[0x01, 0x00]).unwrap();
    assert_eq!(writable.read_value(0), Err(GattError::ReadNotPermitted));
}

#[test]
fn test_service_add_characteristic_is_idempotent() {
    let service = Service::new(service_path(), base_uuid(), true);
    service.add_characteristic(chrc_path());
    service.add_characteristic(chrc_path());
    assert_eq!(service.characteristics(), vec![chrc_path()]);
    assert_eq!(
        service.properties().get("Characteristics").unwrap(),
        &PropertyValue::Paths(vec![chrc_path()])
    );
}

#[test]
fn test_descriptor_write_then_read_round_trip() {
    let desc = Descriptor::new(
        chrc_path().child("desc1").unwrap(),
        Uuid::from_u16(0x2901),
        chrc_path(),
        DescriptorFlags::READ | DescriptorFlags::WRITE,
        b"Status".to_vec(),
    );
    desc.write_value(0, b"Wi-Fi status").unwrap();
    assert_eq!(desc.read_value(0).unwrap(), b"Wi-Fi status");

    desc.write_value(6, b"state").unwrap();
    assert_eq!(desc.read_value(0).unwrap(), b"Wi-Fi state");
    assert_eq!(desc.read_value(6).unwrap(), b"state");
}

#[test]
fn test_oversized_writes_are_rejected() {
    let (chrc, _) = characteristic(CharacteristicFlags::READ | CharacteristicFlags::WRITE);
    assert_eq!(
        chrc.write_value(usize::MAX, b"x"),
        Err(GattError::InvalidOffset(usize::MAX))
    );
    assert!(matches!(
        chrc.write_value(0, &[0u8; MAX_ATTRIBUTE_LEN + 1]),
        Err(GattError::InvalidValueLength(_))
    ));
    assert_eq!(chrc.read_value(0).unwrap(), b"Idle");

    let desc = Descriptor::new(
        chrc_path().child("desc1").unwrap(),
        Uuid::from_u16(0x2902),
        chrc_path(),
        DescriptorFlags::READ | DescriptorFlags::WRITE,
        vec![0x00, 0x00],
    );
    assert_eq!(
        desc.write_value(1 << 20, &[0x01]),
        Err(GattError::InvalidOffset(1 << 20))
    );
    assert_eq!(desc.read_value(0).unwrap(), [0x00, 0x00]);
}
