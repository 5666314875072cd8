//! Access flags for characteristics and descriptors

use bitflags::bitflags;

bitflags! {
    /// Characteristic properties as defined in the Bluetooth specification
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CharacteristicFlags: u8 {
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
    }
}

impl CharacteristicFlags {
    pub fn can_read(&self) -> bool {
        self.contains(Self::READ)
    }

    /// True if either write variant is declared
    pub fn can_write(&self) -> bool {
        self.intersects(Self::WRITE | Self::WRITE_WITHOUT_RESPONSE)
    }

    pub fn can_notify(&self) -> bool {
        self.contains(Self::NOTIFY)
    }

    /// Flag strings in the form BlueZ expects for the `Flags` property
    pub fn names(&self) -> Vec<String> {
        [
            (Self::READ, "read"),
            (Self::WRITE, "write"),
            (Self::WRITE_WITHOUT_RESPONSE, "write-without-response"),
            (Self::NOTIFY, "notify"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name.to_string())
        .collect()
    }
}

bitflags! {
    /// Descriptor access flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DescriptorFlags: u8 {
        const READ = 0x01;
        const WRITE = 0x02;
    }
}

impl DescriptorFlags {
    pub fn can_read(&self) -> bool {
        self.contains(Self::READ)
    }

    pub fn can_write(&self) -> bool {
        self.contains(Self::WRITE)
    }

    pub fn names(&self) -> Vec<String> {
        [(Self::READ, "read"), (Self::WRITE, "write")]
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name.to_string())
            .collect()
    }
}
