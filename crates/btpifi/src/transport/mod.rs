//! Transport abstraction
//!
//! The host stack reaches the peripheral over a message bus that exports
//! objects by path, accepts application and advertisement registrations and
//! carries property-changed signals back to subscribed clients. The model only
//! depends on the traits in this module.

mod local;

pub use local::{BusEvent, LocalBus, HISTORY_CAPACITY};

use crate::gatt::PropertyBag;
use crate::object_manager::ManagedObjects;
use crate::path::ObjectPath;
use thiserror::Error;

pub const OBJECT_MANAGER_IFACE: &str = "org.freedesktop.DBus.ObjectManager";

/// Bus-level failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Object is not exported: {0}")]
    NotExported(ObjectPath),

    #[error("Object is already exported: {0}")]
    AlreadyExported(ObjectPath),

    #[error("Nothing registered at {0}")]
    NotRegistered(ObjectPath),

    #[error("Already registered: {0}")]
    AlreadyRegistered(ObjectPath),

    #[error("Signal delivery failed: {0}")]
    Delivery(String),
}

/// Receiver of property-changed signals
pub trait NotificationSink: Send + Sync {
    fn properties_changed(
        &self,
        path: &ObjectPath,
        changed: &PropertyBag,
    ) -> Result<(), TransportError>;
}

/// The message bus the peripheral is exported on
pub trait Bus: NotificationSink {
    /// Make an object reachable at `path` under `interface`
    fn export(&self, path: &ObjectPath, interface: &'static str) -> Result<(), TransportError>;

    fn unexport(&self, path: &ObjectPath) -> Result<(), TransportError>;

    /// Ask the host to register the GATT application rooted at `root`.
    /// The host reads `objects` once during registration.
    fn register_application(
        &self,
        root: &ObjectPath,
        objects: &ManagedObjects,
    ) -> Result<(), TransportError>;

    fn unregister_application(&self, root: &ObjectPath) -> Result<(), TransportError>;

    fn register_advertisement(
        &self,
        path: &ObjectPath,
        properties: &PropertyBag,
    ) -> Result<(), TransportError>;

    fn unregister_advertisement(&self, path: &ObjectPath) -> Result<(), TransportError>;
}
