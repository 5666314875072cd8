//! Error types for the btpifi library
//!
//! Every GATT operation returns a [`GattResult`]. Each [`GattError`] belongs to
//! an [`ErrorKind`] and maps onto the BlueZ / D-Bus error name a transport hands
//! back to the remote client as a method-call fault.

use crate::path::ObjectPath;
use thiserror::Error;

pub const ERROR_NOT_PERMITTED: &str = "org.bluez.Error.NotPermitted";
pub const ERROR_NOT_SUPPORTED: &str = "org.bluez.Error.NotSupported";
pub const ERROR_INVALID_OFFSET: &str = "org.bluez.Error.InvalidOffset";
pub const ERROR_INVALID_VALUE_LENGTH: &str = "org.bluez.Error.InvalidValueLength";
pub const ERROR_FAILED: &str = "org.bluez.Error.Failed";
pub const ERROR_INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";
pub const ERROR_PROPERTY_READ_ONLY: &str = "org.freedesktop.DBus.Error.PropertyReadOnly";
pub const ERROR_UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";
pub const ERROR_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";

/// Broad class of a failure, used to decide how it propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation not allowed by the declared flags
    Permission,
    /// Malformed input
    Validation,
    /// Unknown property, interface, method or path
    NotFound,
    /// Scan/connect collaborator failure
    ExternalAction,
    /// Notification delivery or bus failure
    Transport,
}

/// GATT operation error
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GattError {
    #[error("Read not permitted")]
    ReadNotPermitted,

    #[error("Write not permitted")]
    WriteNotPermitted,

    #[error("Notify not supported")]
    NotifyNotSupported,

    #[error("Invalid offset: {0}")]
    InvalidOffset(usize),

    #[error("{0}")]
    InvalidValueLength(String),

    #[error("No such interface \"{0}\"")]
    InterfaceNotFound(String),

    #[error("No such property \"{0}\"")]
    PropertyNotFound(String),

    #[error("No such method {interface}.{method}")]
    UnknownMethod { interface: String, method: String },

    #[error("No such object: {0}")]
    ObjectNotFound(ObjectPath),

    #[error("Property \"{0}\" is read-only")]
    ReadOnly(String),

    #[error("Object path already registered: {0}")]
    DuplicatePath(ObjectPath),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("{from} references missing object {to}")]
    DanglingReference { from: ObjectPath, to: ObjectPath },

    #[error("Failed: {0}")]
    Failed(String),
}

impl GattError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GattError::ReadNotPermitted
            | GattError::WriteNotPermitted
            | GattError::NotifyNotSupported => ErrorKind::Permission,
            GattError::InvalidOffset(_)
            | GattError::InvalidValueLength(_)
            | GattError::ReadOnly(_)
            | GattError::DuplicatePath(_)
            | GattError::InvalidPath(_)
            | GattError::DanglingReference { .. } => ErrorKind::Validation,
            GattError::InterfaceNotFound(_)
            | GattError::PropertyNotFound(_)
            | GattError::UnknownMethod { .. }
            | GattError::ObjectNotFound(_) => ErrorKind::NotFound,
            GattError::Failed(_) => ErrorKind::ExternalAction,
        }
    }

    /// Error name returned to the remote caller
    pub fn error_name(&self) -> &'static str {
        match self {
            GattError::ReadNotPermitted | GattError::WriteNotPermitted => ERROR_NOT_PERMITTED,
            GattError::NotifyNotSupported => ERROR_NOT_SUPPORTED,
            GattError::InvalidOffset(_) => ERROR_INVALID_OFFSET,
            GattError::InvalidValueLength(_) => ERROR_INVALID_VALUE_LENGTH,
            GattError::InterfaceNotFound(_)
            | GattError::PropertyNotFound(_)
            | GattError::InvalidPath(_) => ERROR_INVALID_ARGS,
            GattError::UnknownMethod { .. } => ERROR_UNKNOWN_METHOD,
            GattError::ObjectNotFound(_) => ERROR_UNKNOWN_OBJECT,
            GattError::ReadOnly(_) => ERROR_PROPERTY_READ_ONLY,
            GattError::DuplicatePath(_)
            | GattError::DanglingReference { .. }
            | GattError::Failed(_) => ERROR_FAILED,
        }
    }
}

/// GATT Result type
pub type GattResult<T> = Result<T, GattError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_errors_map_to_bluez_names() {
        assert_eq!(GattError::ReadNotPermitted.error_name(), ERROR_NOT_PERMITTED);
        assert_eq!(GattError::WriteNotPermitted.error_name(), ERROR_NOT_PERMITTED);
        assert_eq!(GattError::NotifyNotSupported.error_name(), ERROR_NOT_SUPPORTED);
        assert_eq!(GattError::ReadNotPermitted.kind(), ErrorKind::Permission);
    }

    #[test]
    fn test_validation_error_message() {
        let err = GattError::InvalidValueLength("SSID too long (max 32 bytes)".into());
        assert_eq!(err.to_string(), "SSID too long (max 32 bytes)");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.error_name(), ERROR_INVALID_VALUE_LENGTH);
    }

    #[test]
    fn test_not_found_errors() {
        let err = GattError::PropertyNotFound("Bogus".into());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.error_name(), ERROR_INVALID_ARGS);
        assert_eq!(err.to_string(), "No such property \"Bogus\"");
    }
}
