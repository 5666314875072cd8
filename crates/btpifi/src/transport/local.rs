//! In-process bus
//!
//! `LocalBus` keeps the export table and registrations in memory, records
//! every bus event in order and rebroadcasts it to live subscribers. The
//! daemon console and the tests drive the peripheral through it.

use super::{Bus, NotificationSink, TransportError};
use crate::gatt::PropertyBag;
use crate::object_manager::ManagedObjects;
use crate::path::ObjectPath;
use crate::sync::lock;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 256;
/// Oldest events are dropped beyond this
pub const HISTORY_CAPACITY: usize = 1024;

/// Something that happened on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Exported {
        path: ObjectPath,
        interface: &'static str,
    },
    Unexported {
        path: ObjectPath,
    },
    ApplicationRegistered {
        root: ObjectPath,
        objects: usize,
    },
    ApplicationUnregistered {
        root: ObjectPath,
    },
    AdvertisementRegistered {
        path: ObjectPath,
    },
    AdvertisementUnregistered {
        path: ObjectPath,
    },
    PropertiesChanged {
        path: ObjectPath,
        changed: PropertyBag,
    },
}

#[derive(Debug, Default)]
struct BusState {
    exported: BTreeMap<ObjectPath, &'static str>,
    applications: HashMap<ObjectPath, ManagedObjects>,
    advertisements: HashMap<ObjectPath, PropertyBag>,
    history: VecDeque<BusEvent>,
}

pub struct LocalBus {
    state: Mutex<BusState>,
    events: broadcast::Sender<BusEvent>,
    fail_notifications: AtomicBool,
}

impl LocalBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(BusState::default()),
            events,
            fail_notifications: AtomicBool::new(false),
        }
    }

    /// Live feed of bus events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }

    /// The most recent [`HISTORY_CAPACITY`] events, oldest first
    pub fn events(&self) -> Vec<BusEvent> {
        lock(&self.state).history.iter().cloned().collect()
    }

    pub fn clear_events(&self) {
        lock(&self.state).history.clear();
    }

    /// `Value` payloads signalled for `path`, oldest first
    pub fn value_notifications(&self, path: &ObjectPath) -> Vec<Vec<u8>> {
        self.changes_for(path, "Value")
            .into_iter()
            .filter_map(|changed| {
                changed
                    .get("Value")
                    .ok()
                    .and_then(|value| value.as_bytes())
                    .map(<[u8]>::to_vec)
            })
            .collect()
    }

    /// `Notifying` transitions signalled for `path`
    pub fn notifying_changes(&self, path: &ObjectPath) -> Vec<bool> {
        self.changes_for(path, "Notifying")
            .into_iter()
            .filter_map(|changed| changed.get("Notifying").ok().and_then(|v| v.as_bool()))
            .collect()
    }

    fn changes_for(&self, path: &ObjectPath, property: &str) -> Vec<PropertyBag> {
        lock(&self.state)
            .history
            .iter()
            .filter_map(|event| match event {
                BusEvent::PropertiesChanged { path: p, changed }
                    if p == path && changed.get(property).is_ok() =>
                {
                    Some(changed.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn is_exported(&self, path: &ObjectPath) -> bool {
        lock(&self.state).exported.contains_key(path)
    }

    pub fn exported_paths(&self) -> Vec<ObjectPath> {
        lock(&self.state).exported.keys().cloned().collect()
    }

    /// The object tree the host read when the application was registered
    pub fn registered_application(&self, root: &ObjectPath) -> Option<ManagedObjects> {
        lock(&self.state).applications.get(root).cloned()
    }

    pub fn registered_advertisement(&self, path: &ObjectPath) -> Option<PropertyBag> {
        lock(&self.state).advertisements.get(path).cloned()
    }

    /// Make every subsequent property-changed signal fail
    pub fn set_fail_notifications(&self, fail: bool) {
        self.fail_notifications.store(fail, Ordering::SeqCst);
    }

    fn record(&self, state: &mut BusState, event: BusEvent) {
        if state.history.len() == HISTORY_CAPACITY {
            state.history.pop_front();
        }
        state.history.push_back(event.clone());
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for LocalBus {
    fn properties_changed(
        &self,
        path: &ObjectPath,
        changed: &PropertyBag,
    ) -> Result<(), TransportError> {
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(TransportError::Delivery(format!(
                "signal for {} dropped",
                path
            )));
        }
        let mut state = lock(&self.state);
        if !state.exported.contains_key(path) {
            return Err(TransportError::NotExported(path.clone()));
        }
        debug!("PropertiesChanged {} {:?}", path, changed.names().collect::<Vec<_>>());
        self.record(
            &mut state,
            BusEvent::PropertiesChanged {
                path: path.clone(),
                changed: changed.clone(),
            },
        );
        Ok(())
    }
}

impl Bus for LocalBus {
    fn export(&self, path: &ObjectPath, interface: &'static str) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.exported.contains_key(path) {
            return Err(TransportError::AlreadyExported(path.clone()));
        }
        state.exported.insert(path.clone(), interface);
        debug!("Exported {} ({})", path, interface);
        self.record(
            &mut state,
            BusEvent::Exported {
                path: path.clone(),
                interface,
            },
        );
        Ok(())
    }

    fn unexport(&self, path: &ObjectPath) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.exported.remove(path).is_none() {
            return Err(TransportError::NotExported(path.clone()));
        }
        debug!("Unexported {}", path);
        self.record(&mut state, BusEvent::Unexported { path: path.clone() });
        Ok(())
    }

    fn register_application(
        &self,
        root: &ObjectPath,
        objects: &ManagedObjects,
    ) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if !state.exported.contains_key(root) {
            return Err(TransportError::NotExported(root.clone()));
        }
        if state.applications.contains_key(root) {
            return Err(TransportError::AlreadyRegistered(root.clone()));
        }
        // Every advertised object must be reachable before the host walks the tree.
        if let Some(missing) = objects.paths().find(|p| !state.exported.contains_key(*p)) {
            return Err(TransportError::NotExported(missing.clone()));
        }
        state.applications.insert(root.clone(), objects.clone());
        info!("GATT application registered at {} ({} objects)", root, objects.len());
        self.record(
            &mut state,
            BusEvent::ApplicationRegistered {
                root: root.clone(),
                objects: objects.len(),
            },
        );
        Ok(())
    }

    fn unregister_application(&self, root: &ObjectPath) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.applications.remove(root).is_none() {
            return Err(TransportError::NotRegistered(root.clone()));
        }
        info!("GATT application unregistered at {}", root);
        self.record(&mut state, BusEvent::ApplicationUnregistered { root: root.clone() });
        Ok(())
    }

    fn register_advertisement(
        &self,
        path: &ObjectPath,
        properties: &PropertyBag,
    ) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if !state.exported.contains_key(path) {
            return Err(TransportError::NotExported(path.clone()));
        }
        if state.advertisements.contains_key(path) {
            return Err(TransportError::AlreadyRegistered(path.clone()));
        }
        state.advertisements.insert(path.clone(), properties.clone());
        info!("Advertisement registered at {}", path);
        self.record(&mut state, BusEvent::AdvertisementRegistered { path: path.clone() });
        Ok(())
    }

    fn unregister_advertisement(&self, path: &ObjectPath) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.advertisements.remove(path).is_none() {
            return Err(TransportError::NotRegistered(path.clone()));
        }
        info!("Advertisement unregistered at {}", path);
        self.record(&mut state, BusEvent::AdvertisementUnregistered { path: path.clone() });
        Ok(())
    }
}
