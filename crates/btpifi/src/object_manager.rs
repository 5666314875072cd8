//! Managed object registry
//!
//! The host discovers a GATT application by calling `GetManagedObjects` on
//! its root and walking the result. [`ObjectManager`] owns every service,
//! characteristic and descriptor of the application, keyed by path and kept
//! in registration order so discovery output is deterministic.

use crate::error::{GattError, GattResult};
use crate::gatt::{
    Characteristic, Descriptor, Properties, PropertyBag, Service, GATT_CHARACTERISTIC_IFACE,
    GATT_DESCRIPTOR_IFACE, GATT_SERVICE_IFACE,
};
use crate::path::ObjectPath;
use crate::transport::NotificationSink;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One exported GATT object
#[derive(Debug, Clone)]
pub enum GattObject {
    Service(Arc<Service>),
    Characteristic(Arc<Characteristic>),
    Descriptor(Arc<Descriptor>),
}

impl GattObject {
    pub fn path(&self) -> &ObjectPath {
        match self {
            GattObject::Service(s) => s.path(),
            GattObject::Characteristic(c) => c.path(),
            GattObject::Descriptor(d) => d.path(),
        }
    }

    pub fn interface(&self) -> &'static str {
        match self {
            GattObject::Service(_) => GATT_SERVICE_IFACE,
            GattObject::Characteristic(_) => GATT_CHARACTERISTIC_IFACE,
            GattObject::Descriptor(_) => GATT_DESCRIPTOR_IFACE,
        }
    }

    pub fn properties(&self) -> PropertyBag {
        self.as_properties().properties()
    }

    pub fn as_properties(&self) -> &dyn Properties {
        match self {
            GattObject::Service(s) => s.as_ref(),
            GattObject::Characteristic(c) => c.as_ref(),
            GattObject::Descriptor(d) => d.as_ref(),
        }
    }
}

impl From<Arc<Service>> for GattObject {
    fn from(service: Arc<Service>) -> Self {
        GattObject::Service(service)
    }
}

impl From<Arc<Characteristic>> for GattObject {
    fn from(characteristic: Arc<Characteristic>) -> Self {
        GattObject::Characteristic(characteristic)
    }
}

impl From<Arc<Descriptor>> for GattObject {
    fn from(descriptor: Arc<Descriptor>) -> Self {
        GattObject::Descriptor(descriptor)
    }
}

/// Result of `GetManagedObjects`: path -> interface -> properties
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedObjects {
    entries: Vec<(ObjectPath, Vec<PropertyBag>)>,
}

impl ManagedObjects {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &ObjectPath> {
        self.entries.iter().map(|(path, _)| path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectPath, &[PropertyBag])> {
        self.entries
            .iter()
            .map(|(path, interfaces)| (path, interfaces.as_slice()))
    }

    /// Interfaces of one object
    pub fn get(&self, path: &ObjectPath) -> Option<&[PropertyBag]> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, interfaces)| interfaces.as_slice())
    }
}

struct InterfaceMap<'a>(&'a [PropertyBag]);

impl Serialize for InterfaceMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for bag in self.0 {
            map.serialize_entry(bag.interface(), bag)?;
        }
        map.end()
    }
}

impl Serialize for ManagedObjects {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, interfaces) in &self.entries {
            map.serialize_entry(path, &InterfaceMap(interfaces))?;
        }
        map.end()
    }
}

/// Registry of every object in one GATT application
#[derive(Debug)]
pub struct ObjectManager {
    root: ObjectPath,
    objects: Vec<GattObject>,
    index: HashMap<ObjectPath, usize>,
}

impl ObjectManager {
    pub fn new(root: ObjectPath) -> Self {
        Self {
            root,
            objects: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Application root, where the object manager interface is exported
    pub fn root(&self) -> &ObjectPath {
        &self.root
    }

    pub fn add_object(&mut self, object: impl Into<GattObject>) -> GattResult<()> {
        let object = object.into();
        let path = object.path().clone();
        if self.index.contains_key(&path) || path == self.root {
            return Err(GattError::DuplicatePath(path));
        }
        debug!("Registered {} ({})", path, object.interface());
        self.index.insert(path, self.objects.len());
        self.objects.push(object);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects in registration order
    pub fn objects(&self) -> impl Iterator<Item = &GattObject> {
        self.objects.iter()
    }

    pub fn get(&self, path: &ObjectPath) -> GattResult<&GattObject> {
        self.index
            .get(path)
            .map(|&i| &self.objects[i])
            .ok_or_else(|| GattError::ObjectNotFound(path.clone()))
    }

    pub fn service(&self, path: &ObjectPath) -> GattResult<&Arc<Service>> {
        match self.get(path)? {
            GattObject::Service(s) => Ok(s),
            _ => Err(GattError::InterfaceNotFound(GATT_SERVICE_IFACE.to_string())),
        }
    }

    pub fn characteristic(&self, path: &ObjectPath) -> GattResult<&Arc<Characteristic>> {
        match self.get(path)? {
            GattObject::Characteristic(c) => Ok(c),
            _ => Err(GattError::InterfaceNotFound(
                GATT_CHARACTERISTIC_IFACE.to_string(),
            )),
        }
    }

    pub fn descriptor(&self, path: &ObjectPath) -> GattResult<&Arc<Descriptor>> {
        match self.get(path)? {
            GattObject::Descriptor(d) => Ok(d),
            _ => Err(GattError::InterfaceNotFound(GATT_DESCRIPTOR_IFACE.to_string())),
        }
    }

    /// Every object exactly once, in registration order
    pub fn get_managed_objects(&self) -> ManagedObjects {
        ManagedObjects {
            entries: self
                .objects
                .iter()
                .map(|object| (object.path().clone(), vec![object.properties()]))
                .collect(),
        }
    }

    /// Check the tree is complete before it is handed to the host.
    ///
    /// Every object sits below the root and every reference, in both
    /// directions, resolves to a registered object of the right kind.
    pub fn validate(&self) -> GattResult<()> {
        for object in &self.objects {
            let path = object.path();
            if !path.is_descendant_of(&self.root) {
                return Err(GattError::InvalidPath(path.to_string()));
            }
            match object {
                GattObject::Service(service) => {
                    for chrc in service.characteristics() {
                        self.expect_reference(path, &chrc, |o| {
                            matches!(o, GattObject::Characteristic(c) if c.service() == path)
                        })?;
                    }
                }
                GattObject::Characteristic(chrc) => {
                    self.expect_reference(path, chrc.service(), |o| {
                        matches!(o, GattObject::Service(_))
                    })?;
                    for desc in chrc.descriptors() {
                        self.expect_reference(path, &desc, |o| {
                            matches!(o, GattObject::Descriptor(d) if d.characteristic() == path)
                        })?;
                    }
                }
                GattObject::Descriptor(desc) => {
                    self.expect_reference(path, desc.characteristic(), |o| {
                        matches!(o, GattObject::Characteristic(_))
                    })?;
                }
            }
        }
        Ok(())
    }

    fn expect_reference(
        &self,
        from: &ObjectPath,
        to: &ObjectPath,
        accept: impl Fn(&GattObject) -> bool,
    ) -> GattResult<()> {
        match self.get(to) {
            Ok(object) if accept(object) => Ok(()),
            _ => Err(GattError::DanglingReference {
                from: from.clone(),
                to: to.clone(),
            }),
        }
    }

    /// Route property-changed signals of every characteristic to `sink`
    pub fn attach_sink(&self, sink: Arc<dyn NotificationSink>) {
        for object in &self.objects {
            if let GattObject::Characteristic(chrc) = object {
                chrc.attach_sink(Arc::clone(&sink));
            }
        }
    }

    pub fn detach_sink(&self) {
        for object in &self.objects {
            if let GattObject::Characteristic(chrc) = object {
                chrc.detach_sink();
            }
        }
    }
}
