use super::property::{Properties, PropertyBag};
use super::GATT_SERVICE_IFACE;
use crate::path::ObjectPath;
use crate::sync::{read, write};
use crate::uuid::Uuid;
use std::sync::RwLock;

/// A GATT service and its ordered characteristic references
#[derive(Debug)]
pub struct Service {
    path: ObjectPath,
    uuid: Uuid,
    primary: bool,
    characteristics: RwLock<Vec<ObjectPath>>,
}

impl Service {
    pub fn new(path: ObjectPath, uuid: Uuid, primary: bool) -> Self {
        Self {
            path,
            uuid,
            primary,
            characteristics: RwLock::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    /// Append a characteristic reference; repeated paths are ignored
    pub fn add_characteristic(&self, path: ObjectPath) {
        let mut characteristics = write(&self.characteristics);
        if !characteristics.contains(&path) {
            characteristics.push(path);
        }
    }

    /// Snapshot of the characteristic path list
    pub fn characteristics(&self) -> Vec<ObjectPath> {
        read(&self.characteristics).clone()
    }
}

impl Properties for Service {
    fn interface(&self) -> &'static str {
        GATT_SERVICE_IFACE
    }

    fn properties(&self) -> PropertyBag {
        PropertyBag::new(GATT_SERVICE_IFACE)
            .with("UUID", self.uuid.to_string())
            .with("Primary", self.primary)
            .with("Characteristics", self.characteristics())
    }
}
