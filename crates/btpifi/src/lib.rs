//! btpifi - BLE GATT peripheral model for Wi-Fi provisioning
//!
//! This library models the peripheral side of a BlueZ GATT application: a
//! service with its characteristics and descriptors, the object-manager style
//! discovery tree the host stack reads during registration, the LE
//! advertisement, and the provisioning command controller that drives Wi-Fi
//! scan/connect through an external provider and reports progress through
//! notifying characteristics.
//!
//! The transport that carries method calls and property-changed signals is
//! abstracted behind [`transport::Bus`]; [`transport::LocalBus`] is an
//! in-process implementation.

pub mod advertisement;
pub mod application;
pub mod config;
pub mod error;
pub mod gatt;
pub mod object_manager;
pub mod path;
pub mod provisioning;
pub mod transport;
pub mod uuid;
pub mod wifi;

mod sync;

// Re-export common types for convenience
pub use advertisement::Advertisement;
pub use application::{Application, ApplicationError, MethodCall, Reply};
pub use config::Config;
pub use error::{ErrorKind, GattError, GattResult};
pub use gatt::{
    Characteristic, CharacteristicFlags, Descriptor, DescriptorFlags, Properties, PropertyBag,
    PropertyValue, Service,
};
pub use object_manager::{GattObject, ManagedObjects, ObjectManager};
pub use path::ObjectPath;
pub use provisioning::{CommandController, Peripheral};
pub use transport::{Bus, LocalBus, NotificationSink, TransportError};
pub use uuid::Uuid;
pub use wifi::{WifiError, WifiProvider};
