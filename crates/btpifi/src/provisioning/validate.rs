//! Credential validation

use crate::error::{GattError, GattResult};

pub const MAX_SSID_LEN: usize = 32;
pub const MIN_PASSPHRASE_LEN: usize = 8;
pub const MAX_PASSPHRASE_LEN: usize = 63;
pub const RAW_PSK_HEX_LEN: usize = 64;

/// SSIDs are at most 32 bytes
pub fn validate_ssid(ssid: &str) -> GattResult<()> {
    if ssid.len() > MAX_SSID_LEN {
        return Err(GattError::InvalidValueLength(format!(
            "SSID too long (max {} bytes)",
            MAX_SSID_LEN
        )));
    }
    Ok(())
}

/// A PSK is empty (open network), an 8-63 character printable ASCII
/// passphrase, or a 64 digit hex key.
pub fn validate_psk(psk: &str) -> GattResult<()> {
    let len = psk.len();
    let valid = len == 0
        || ((MIN_PASSPHRASE_LEN..=MAX_PASSPHRASE_LEN).contains(&len)
            && psk.bytes().all(|b| (0x20..=0x7e).contains(&b)))
        || (len == RAW_PSK_HEX_LEN && hex::decode(psk).is_ok());
    if valid {
        Ok(())
    } else {
        Err(GattError::InvalidValueLength("Invalid PSK length".to_string()))
    }
}
