//! GATT object model
//!
//! This module provides the peripheral-side GATT hierarchy exported to the
//! host stack: services, characteristics and descriptors, each identified by
//! an object path and exposing a read-only property map for its interface.

mod characteristic;
mod descriptor;
mod flags;
mod property;
mod service;
mod value;

#[cfg(test)]
mod tests;

pub use characteristic::{Characteristic, ValueProvider, ValueSource, WriteHandler};
pub use descriptor::Descriptor;
pub use flags::{CharacteristicFlags, DescriptorFlags};
pub use property::{Properties, PropertyBag, PropertyValue};
pub use service::Service;
pub use value::MAX_ATTRIBUTE_LEN;

pub const GATT_SERVICE_IFACE: &str = "org.bluez.GattService1";
pub const GATT_CHARACTERISTIC_IFACE: &str = "org.bluez.GattCharacteristic1";
pub const GATT_DESCRIPTOR_IFACE: &str = "org.bluez.GattDescriptor1";
