use super::flags::CharacteristicFlags;
use super::property::{Properties, PropertyBag};
use super::value::{read_at, write_at};
use super::GATT_CHARACTERISTIC_IFACE;
use crate::error::{GattError, GattResult};
use crate::path::ObjectPath;
use crate::sync::{lock, read, write};
use crate::transport::NotificationSink;
use crate::uuid::Uuid;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Produces a characteristic value at read time.
///
/// Called without the characteristic's state lock held, so a provider may
/// call back into the characteristic it serves.
pub trait ValueProvider: Send + Sync {
    fn value(&self) -> Vec<u8>;
}

impl<F> ValueProvider for F
where
    F: Fn() -> Vec<u8> + Send + Sync,
{
    fn value(&self) -> Vec<u8> {
        self()
    }
}

/// Receives the payload of a remote write instead of it being stored
pub trait WriteHandler: Send + Sync {
    fn handle_write(&self, data: &[u8]) -> GattResult<()>;
}

impl<F> WriteHandler for F
where
    F: Fn(&[u8]) -> GattResult<()> + Send + Sync,
{
    fn handle_write(&self, data: &[u8]) -> GattResult<()> {
        self(data)
    }
}

/// Where a characteristic's readable value comes from
#[derive(Clone)]
pub enum ValueSource {
    /// The characteristic's own buffer
    Static,
    /// Evaluated on every read and notification
    Computed(Arc<dyn ValueProvider>),
}

#[derive(Debug, Default)]
struct ValueState {
    value: Vec<u8>,
    notifying: bool,
}

/// A GATT characteristic
///
/// Value and notification state live behind one lock, so `set_value` updates
/// the value and emits the notification as a single step.
pub struct Characteristic {
    path: ObjectPath,
    uuid: Uuid,
    service: ObjectPath,
    flags: CharacteristicFlags,
    source: ValueSource,
    write_handler: Option<Arc<dyn WriteHandler>>,
    descriptors: RwLock<Vec<ObjectPath>>,
    state: Mutex<ValueState>,
    sink: RwLock<Option<Arc<dyn NotificationSink>>>,
}

impl Characteristic {
    pub fn new(
        path: ObjectPath,
        uuid: Uuid,
        service: ObjectPath,
        flags: CharacteristicFlags,
    ) -> Self {
        Self {
            path,
            uuid,
            service,
            flags,
            source: ValueSource::Static,
            write_handler: None,
            descriptors: RwLock::new(Vec::new()),
            state: Mutex::new(ValueState::default()),
            sink: RwLock::new(None),
        }
    }

    /// Set the initial value of the static buffer
    pub fn with_value(self, value: impl Into<Vec<u8>>) -> Self {
        lock(&self.state).value = value.into();
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn ValueProvider>) -> Self {
        self.source = ValueSource::Computed(provider);
        self
    }

    pub fn with_write_handler(mut self, handler: Arc<dyn WriteHandler>) -> Self {
        self.write_handler = Some(handler);
        self
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn service(&self) -> &ObjectPath {
        &self.service
    }

    pub fn flags(&self) -> CharacteristicFlags {
        self.flags
    }

    /// Idempotent append of a descriptor reference
    pub fn add_descriptor(&self, path: ObjectPath) {
        let mut descriptors = write(&self.descriptors);
        if !descriptors.contains(&path) {
            descriptors.push(path);
        }
    }

    pub fn descriptors(&self) -> Vec<ObjectPath> {
        read(&self.descriptors).clone()
    }

    /// Current value regardless of the read flag
    pub fn value(&self) -> Vec<u8> {
        match self.computed_value() {
            Some(value) => value,
            None => lock(&self.state).value.clone(),
        }
    }

    pub fn notifying(&self) -> bool {
        lock(&self.state).notifying
    }

    pub fn attach_sink(&self, sink: Arc<dyn NotificationSink>) {
        *write(&self.sink) = Some(sink);
    }

    pub fn detach_sink(&self) {
        *write(&self.sink) = None;
    }

    pub fn read_value(&self, offset: usize) -> GattResult<Vec<u8>> {
        if !self.flags.can_read() {
            return Err(GattError::ReadNotPermitted);
        }
        let value = read_at(&self.value(), offset)?;
        debug!("ReadValue {} offset={} len={}", self.path, offset, value.len());
        Ok(value)
    }

    /// Handle a remote write.
    ///
    /// With a write handler the payload is handed over as-is and the offset is
    /// not applied; otherwise the static buffer is spliced at `offset`.
    pub fn write_value(&self, offset: usize, data: &[u8]) -> GattResult<()> {
        if !self.flags.can_write() {
            return Err(GattError::WriteNotPermitted);
        }
        debug!("WriteValue {} offset={} len={}", self.path, offset, data.len());
        match &self.write_handler {
            Some(handler) => handler.handle_write(data),
            None => write_at(&mut lock(&self.state).value, offset, data),
        }
    }

    pub fn start_notify(&self) -> GattResult<()> {
        self.set_notifying(true)
    }

    pub fn stop_notify(&self) -> GattResult<()> {
        self.set_notifying(false)
    }

    fn set_notifying(&self, enabled: bool) -> GattResult<()> {
        if !self.flags.can_notify() {
            return Err(GattError::NotifyNotSupported);
        }
        let mut state = lock(&self.state);
        if state.notifying == enabled {
            debug!("{} already in requested notify state", self.path);
            return Ok(());
        }
        state.notifying = enabled;
        info!(
            "{} notifications {}",
            self.path,
            if enabled { "enabled" } else { "disabled" }
        );
        let changed = PropertyBag::new(GATT_CHARACTERISTIC_IFACE).with("Notifying", enabled);
        self.emit(&changed);
        Ok(())
    }

    /// Store `value`, returning true iff it differs from the previous one
    pub fn update_value(&self, value: impl Into<Vec<u8>>) -> bool {
        let value = value.into();
        let mut state = lock(&self.state);
        if state.value == value {
            return false;
        }
        state.value = value;
        true
    }

    /// Emit a `Value` property change if notifications are enabled.
    ///
    /// Delivery failures are logged and reported as `false`.
    pub fn send_notification(&self) -> bool {
        let computed = self.computed_value();
        let state = lock(&self.state);
        self.notify_locked(&state, computed)
    }

    /// `update_value` followed, on change, by `send_notification`
    pub fn set_value(&self, value: impl Into<Vec<u8>>) -> bool {
        let value = value.into();
        let computed = self.computed_value();
        let mut state = lock(&self.state);
        if state.value == value {
            return false;
        }
        state.value = value;
        self.notify_locked(&state, computed);
        true
    }

    fn computed_value(&self) -> Option<Vec<u8>> {
        match &self.source {
            ValueSource::Static => None,
            ValueSource::Computed(provider) => Some(provider.value()),
        }
    }

    fn notify_locked(&self, state: &ValueState, computed: Option<Vec<u8>>) -> bool {
        if !state.notifying {
            return false;
        }
        let value = computed.unwrap_or_else(|| state.value.clone());
        let changed = PropertyBag::new(GATT_CHARACTERISTIC_IFACE).with("Value", value);
        self.emit(&changed)
    }

    fn emit(&self, changed: &PropertyBag) -> bool {
        let Some(sink) = read(&self.sink).clone() else {
            debug!("{} has no notification sink attached", self.path);
            return false;
        };
        match sink.properties_changed(&self.path, changed) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to deliver property change for {}: {}", self.path, e);
                false
            }
        }
    }
}

impl fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Characteristic")
            .field("path", &self.path)
            .field("uuid", &self.uuid)
            .field("flags", &self.flags)
            .field("computed", &matches!(self.source, ValueSource::Computed(_)))
            .field("write_handler", &self.write_handler.is_some())
            .field("notifying", &self.notifying())
            .finish()
    }
}

impl Properties for Characteristic {
    fn interface(&self) -> &'static str {
        GATT_CHARACTERISTIC_IFACE
    }

    fn properties(&self) -> PropertyBag {
        let mut bag = PropertyBag::new(GATT_CHARACTERISTIC_IFACE)
            .with("UUID", self.uuid.to_string())
            .with("Service", self.service.clone())
            .with("Flags", self.flags.names())
            .with("Descriptors", self.descriptors());
        if self.flags.can_read() {
            bag.insert("Value", self.value());
        }
        if self.flags.can_notify() {
            bag.insert("Notifying", self.notifying());
        }
        bag
    }
}
