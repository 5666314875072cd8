use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Represents a 128-bit Bluetooth UUID.
///
/// 16-bit SIG-assigned values (such as `2901`, the Characteristic User
/// Description descriptor) are expanded onto the Bluetooth base UUID.
/// Internally the UUID is stored in big-endian (textual) byte order.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// The base UUID "00000000-0000-1000-8000-00805F9B34FB" (big-endian).
const BASE_UUID_BYTES: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB,
];

/// Characteristic User Description
pub const USER_DESCRIPTION_UUID: Uuid = Uuid::from_u16(0x2901);

impl Uuid {
    /// Creates a UUID from 16 big-endian bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a 128-bit UUID from a 16-bit SIG-assigned value.
    pub const fn from_u16(uuid16: u16) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[2] = (uuid16 >> 8) as u8;
        bytes[3] = uuid16 as u8;
        Uuid { bytes }
    }

    /// Creates a UUID from its 128-bit integer value.
    pub const fn from_u128(value: u128) -> Self {
        Uuid {
            bytes: value.to_be_bytes(),
        }
    }

    /// Returns the underlying 16 bytes in big-endian order.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Returns the bytes in little-endian order, as carried over the air.
    pub fn to_bytes_le(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    /// Returns the 16-bit value if this UUID sits on the Bluetooth base UUID.
    pub fn as_u16(&self) -> Option<u16> {
        let on_base = self.bytes[0] == 0
            && self.bytes[1] == 0
            && self.bytes[4..] == BASE_UUID_BYTES[4..];
        on_base.then(|| u16::from_be_bytes([self.bytes[2], self.bytes[3]]))
    }

    /// Replaces the last hex digit of the first group with `digit`.
    ///
    /// Related characteristics of one service are numbered this way:
    /// `133934e0-...` is the service, `133934e1-...` the first characteristic.
    pub fn with_role_digit(&self, digit: u8) -> Self {
        let mut bytes = self.bytes;
        bytes[3] = (bytes[3] & 0xF0) | (digit & 0x0F);
        Uuid { bytes }
    }
}

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl From<u128> for Uuid {
    fn from(value: u128) -> Self {
        Uuid::from_u128(value)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Standard hyphenated format
        let b = &self.bytes;
        write!(f, "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show short form if possible, otherwise full hyphenated form
        if let Some(u16_val) = self.as_u16() {
            write!(f, "Uuid(0x{:04X})", u16_val)
        } else {
            write!(f, "Uuid({})", self)
        }
    }
}

impl Serialize for Uuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UuidParseError {
    #[error("UUID must have 4 or 32 hex digits, got {0}")]
    InvalidLength(usize),

    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),

    #[error("Invalid hex in UUID: {0}")]
    HexError(#[from] hex::FromHexError),
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().any(|c| !c.is_ascii_hexdigit() && c != '-') {
            return Err(UuidParseError::InvalidFormat(s.to_string()));
        }
        let cleaned: String = s.chars().filter(|c| *c != '-').collect();

        match cleaned.len() {
            4 => {
                // 16-bit short form e.g. "2901"
                let mut short = [0u8; 2];
                hex::decode_to_slice(&cleaned, &mut short)?;
                Ok(Uuid::from_u16(u16::from_be_bytes(short)))
            }
            32 => {
                let mut bytes = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes)?;
                Ok(Uuid::from_bytes(bytes))
            }
            n => Err(UuidParseError::InvalidLength(n)),
        }
    }
}
