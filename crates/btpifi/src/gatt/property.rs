//! Property maps
//!
//! Every exported object answers `Get`/`GetAll` for exactly one interface.
//! Values are kept raw alongside their D-Bus type signature so a transport
//! can box them into variants however it likes.

use crate::error::{GattError, GattResult};
use crate::path::ObjectPath;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

/// A raw property value
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    U16(u16),
    Bytes(Vec<u8>),
    Path(ObjectPath),
    Strings(Vec<String>),
    Paths(Vec<ObjectPath>),
}

impl PropertyValue {
    /// D-Bus type signature of this value
    pub fn signature(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "s",
            PropertyValue::Bool(_) => "b",
            PropertyValue::U16(_) => "q",
            PropertyValue::Bytes(_) => "ay",
            PropertyValue::Path(_) => "o",
            PropertyValue::Strings(_) => "as",
            PropertyValue::Paths(_) => "ao",
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<u16> for PropertyValue {
    fn from(value: u16) -> Self {
        PropertyValue::U16(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Bytes(value)
    }
}

impl From<ObjectPath> for PropertyValue {
    fn from(value: ObjectPath) -> Self {
        PropertyValue::Path(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::Strings(value)
    }
}

impl From<Vec<ObjectPath>> for PropertyValue {
    fn from(value: Vec<ObjectPath>) -> Self {
        PropertyValue::Paths(value)
    }
}

/// Ordered property map for a single interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyBag {
    interface: &'static str,
    entries: Vec<(&'static str, PropertyValue)>,
}

impl PropertyBag {
    pub fn new(interface: &'static str) -> Self {
        Self {
            interface,
            entries: Vec::new(),
        }
    }

    /// Builder form of [`PropertyBag::insert`]
    pub fn with(mut self, name: &'static str, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Declare a property, replacing an earlier value of the same name
    pub fn insert(&mut self, name: &'static str, value: impl Into<PropertyValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn get(&self, name: &str) -> GattResult<&PropertyValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
            .ok_or_else(|| GattError::PropertyNotFound(name.to_string()))
    }

    /// Every declared property, in declaration order
    pub fn get_all(&self) -> &[(&'static str, PropertyValue)] {
        &self.entries
    }

    /// Properties are never writable from the remote side.
    pub fn set(&self, name: &str, _value: PropertyValue) -> GattResult<()> {
        debug!("Rejected write of property {}.{}", self.interface, name);
        Err(GattError::ReadOnly(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }
}

impl Serialize for PropertyBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// An object exposing the standard properties interface
pub trait Properties {
    /// The single interface this object implements
    fn interface(&self) -> &'static str;

    /// Current snapshot of every declared property
    fn properties(&self) -> PropertyBag;

    fn get_property(&self, interface: &str, name: &str) -> GattResult<PropertyValue> {
        check_interface(self.interface(), interface)?;
        self.properties().get(name).cloned()
    }

    fn get_all_properties(&self, interface: &str) -> GattResult<PropertyBag> {
        check_interface(self.interface(), interface)?;
        Ok(self.properties())
    }

    fn set_property(&self, interface: &str, name: &str, value: PropertyValue) -> GattResult<()> {
        check_interface(self.interface(), interface)?;
        self.properties().set(name, value)
    }
}

fn check_interface(declared: &str, requested: &str) -> GattResult<()> {
    if declared == requested {
        Ok(())
    } else {
        Err(GattError::InterfaceNotFound(requested.to_string()))
    }
}
