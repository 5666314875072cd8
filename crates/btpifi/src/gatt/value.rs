use crate::error::{GattError, GattResult};

/// Longest attribute value ATT can carry
pub const MAX_ATTRIBUTE_LEN: usize = 512;

/// Return `value[offset..]`, or `InvalidOffset` if the offset lies past the end.
pub(crate) fn read_at(value: &[u8], offset: usize) -> GattResult<Vec<u8>> {
    value
        .get(offset..)
        .map(<[u8]>::to_vec)
        .ok_or(GattError::InvalidOffset(offset))
}

/// Splice `data` into `value` at `offset`.
///
/// The buffer is zero-extended up to `offset` first and the result is
/// truncated to `offset + data.len()`, which may not exceed
/// [`MAX_ATTRIBUTE_LEN`]. A rejected write leaves `value` untouched.
pub(crate) fn write_at(value: &mut Vec<u8>, offset: usize, data: &[u8]) -> GattResult<()> {
    if offset > MAX_ATTRIBUTE_LEN {
        return Err(GattError::InvalidOffset(offset));
    }
    if offset + data.len() > MAX_ATTRIBUTE_LEN {
        return Err(GattError::InvalidValueLength(format!(
            "value exceeds {} bytes",
            MAX_ATTRIBUTE_LEN
        )));
    }
    value.resize(offset, 0);
    value.extend_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_at_offsets() {
        let value = b"Idle";
        assert_eq!(read_at(value, 0).unwrap(), b"Idle");
        assert_eq!(read_at(value, 2).unwrap(), b"le");
        assert_eq!(read_at(value, 4).unwrap(), b"");
        assert_eq!(read_at(value, 5), Err(GattError::InvalidOffset(5)));
    }

    #[test]
    fn test_write_at_splices_and_truncates() {
        let mut value = b"Scanning...".to_vec();
        write_at(&mut value, 4, b"XY").unwrap();
        assert_eq!(value, b"ScanXY");

        let mut value = b"ab".to_vec();
        write_at(&mut value, 4, b"cd").unwrap();
        assert_eq!(value, b"ab\0\0cd");

        let mut value = b"abc".to_vec();
        write_at(&mut value, 0, b"").unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_write_at_rejects_oversized_values() {
        let mut value = b"Idle".to_vec();
        assert_eq!(
            write_at(&mut value, usize::MAX, b"x"),
            Err(GattError::InvalidOffset(usize::MAX))
        );
        assert_eq!(
            write_at(&mut value, MAX_ATTRIBUTE_LEN + 1, b""),
            Err(GattError::InvalidOffset(MAX_ATTRIBUTE_LEN + 1))
        );
        assert!(matches!(
            write_at(&mut value, MAX_ATTRIBUTE_LEN - 1, b"xy"),
            Err(GattError::InvalidValueLength(_))
        ));
        assert_eq!(value, b"Idle");

        write_at(&mut value, MAX_ATTRIBUTE_LEN - 1, b"x").unwrap();
        assert_eq!(value.len(), MAX_ATTRIBUTE_LEN);
    }
}
