use super::flags::DescriptorFlags;
use super::property::{Properties, PropertyBag};
use super::value::{read_at, write_at};
use super::GATT_DESCRIPTOR_IFACE;
use crate::error::{GattError, GattResult};
use crate::path::ObjectPath;
use crate::sync::lock;
use crate::uuid::{Uuid, USER_DESCRIPTION_UUID};
use std::sync::Mutex;
use tracing::debug;

/// A GATT descriptor attached to a characteristic
#[derive(Debug)]
pub struct Descriptor {
    path: ObjectPath,
    uuid: Uuid,
    characteristic: ObjectPath,
    flags: DescriptorFlags,
    value: Mutex<Vec<u8>>,
}

impl Descriptor {
    pub fn new(
        path: ObjectPath,
        uuid: Uuid,
        characteristic: ObjectPath,
        flags: DescriptorFlags,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            path,
            uuid,
            characteristic,
            flags,
            value: Mutex::new(value.into()),
        }
    }

    /// Read-only Characteristic User Description (0x2901) at `<characteristic>/desc0`
    pub fn user_description(characteristic: &ObjectPath, text: &str) -> GattResult<Self> {
        Ok(Self::new(
            characteristic.child("desc0")?,
            USER_DESCRIPTION_UUID,
            characteristic.clone(),
            DescriptorFlags::READ,
            text.as_bytes(),
        ))
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn characteristic(&self) -> &ObjectPath {
        &self.characteristic
    }

    pub fn flags(&self) -> DescriptorFlags {
        self.flags
    }

    pub fn read_value(&self, offset: usize) -> GattResult<Vec<u8>> {
        if !self.flags.can_read() {
            return Err(GattError::ReadNotPermitted);
        }
        let value = read_at(&lock(&self.value), offset)?;
        debug!("ReadValue {} offset={} len={}", self.path, offset, value.len());
        Ok(value)
    }

    pub fn write_value(&self, offset: usize, data: &[u8]) -> GattResult<()> {
        if !self.flags.can_write() {
            return Err(GattError::WriteNotPermitted);
        }
        debug!("WriteValue {} offset={} len={}", self.path, offset, data.len());
        write_at(&mut lock(&self.value), offset, data)
    }
}

impl Properties for Descriptor {
    fn interface(&self) -> &'static str {
        GATT_DESCRIPTOR_IFACE
    }

    fn properties(&self) -> PropertyBag {
        PropertyBag::new(GATT_DESCRIPTOR_IFACE)
            .with("UUID", self.uuid.to_string())
            .with("Characteristic", self.characteristic.clone())
            .with("Flags", self.flags.names())
    }
}
