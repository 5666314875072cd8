//! Object paths
//!
//! Every exported object is identified by a hierarchical path following the
//! D-Bus object path rules: a leading `/`, segments made of `[A-Za-z0-9_]`,
//! no empty segments and no trailing `/` (except for the root path itself).

use crate::error::{GattError, GattResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A validated object path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validate and wrap a path
    pub fn new(path: impl Into<String>) -> GattResult<Self> {
        let path = path.into();
        if is_valid(&path) {
            Ok(ObjectPath(path))
        } else {
            Err(GattError::InvalidPath(path))
        }
    }

    /// The root path `/`
    pub fn root() -> Self {
        ObjectPath("/".to_string())
    }

    /// Append a single segment
    pub fn child(&self, segment: &str) -> GattResult<Self> {
        if segment.contains('/') {
            return Err(GattError::InvalidPath(format!("{}/{}", self.0, segment)));
        }
        if self.0 == "/" {
            ObjectPath::new(format!("/{}", segment))
        } else {
            ObjectPath::new(format!("{}/{}", self.0, segment))
        }
    }

    /// Whether this path lies strictly below `ancestor`
    pub fn is_descendant_of(&self, ancestor: &ObjectPath) -> bool {
        if ancestor.0 == "/" {
            return self.0 != "/";
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/').all(|segment| {
        !segment.is_empty()
            && segment
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectPath {
    type Err = GattError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectPath::new(s)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
