//! Declared registry resources.
//!
//! A run works on a closed set of resource variants: keys and values.
//! Both are plain data; all registry I/O happens in the reconciler.

use crate::codec::{encode, RawData, ValueData, ValueKind};
use crate::error::{RegistryError, Result};
use crate::path::{PathKind, RegistryPath};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Desired existence of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// The resource must exist.
    #[default]
    Present,

    /// The resource must not exist.
    Absent,
}

/// A registry key to manage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryKeyResource {
    /// Key path.
    pub path: RegistryPath,

    /// Desired existence.
    pub ensure: Ensure,

    /// Delete values of this key that are not declared.
    pub purge_values: bool,
}

impl RegistryKeyResource {
    /// Creates a key resource from a declared path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be parsed.
    pub fn new(path: &str, ensure: Ensure) -> Result<Self> {
        let parsed =
            RegistryPath::parse(path, PathKind::Key).map_err(|e| RegistryError::parse(path, e))?;
        Ok(Self {
            path: parsed,
            ensure,
            purge_values: false,
        })
    }

    /// Sets whether unmanaged values are purged.
    pub fn with_purge_values(mut self, purge: bool) -> Self {
        self.purge_values = purge;
        self
    }

    /// Path of the parent key, used for ordering.
    pub fn parent_path(&self) -> Option<RegistryPath> {
        self.path.parent()
    }
}

/// A registry value to manage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryValueResource {
    /// Value path: key path plus value name.
    pub path: RegistryPath,

    /// Desired existence.
    pub ensure: Ensure,

    /// Validated data; `None` for values generated by purging.
    pub data: Option<ValueData>,
}

impl RegistryValueResource {
    /// Creates a value resource from declared path and data.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be parsed or the data does not
    /// satisfy the kind's contract.
    pub fn new(path: &str, ensure: Ensure, kind: ValueKind, data: &RawData) -> Result<Self> {
        let parsed = RegistryPath::parse(path, PathKind::Value)
            .map_err(|e| RegistryError::parse(path, e))?;
        let data = encode(kind, data).map_err(|e| RegistryError::validation(path, e))?;
        Ok(Self {
            path: parsed,
            ensure,
            data: Some(data),
        })
    }

    /// Creates a deletion for an unmanaged value found while purging.
    pub fn purge(key: &RegistryPath, name: &str) -> Self {
        Self {
            path: key.join(name),
            ensure: Ensure::Absent,
            data: None,
        }
    }

    /// Returns true if this value was generated rather than declared.
    pub fn is_synthetic(&self) -> bool {
        self.data.is_none()
    }

    /// Declared kind, if any.
    pub fn kind(&self) -> Option<ValueKind> {
        self.data.as_ref().map(ValueData::kind)
    }

    /// Path of the key holding this value.
    pub fn key_path(&self) -> RegistryPath {
        // value paths always carry a name segment
        self.path.parent().unwrap_or_else(|| self.path.clone())
    }

    /// Name of the value; empty for the default value.
    pub fn name(&self) -> &str {
        self.path.leaf().unwrap_or_default()
    }
}

/// Any managed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// A registry key.
    Key(RegistryKeyResource),

    /// A registry value.
    Value(RegistryValueResource),
}

impl Resource {
    /// Path of the resource.
    pub fn path(&self) -> &RegistryPath {
        match self {
            Resource::Key(key) => &key.path,
            Resource::Value(value) => &value.path,
        }
    }

    /// Desired existence of the resource.
    pub fn ensure(&self) -> Ensure {
        match self {
            Resource::Key(key) => key.ensure,
            Resource::Value(value) => value.ensure,
        }
    }

    /// Resource type name, as used in declarations.
    pub fn type_name(&self) -> &'static str {
        match self {
            Resource::Key(_) => "registry_key",
            Resource::Value(_) => "registry_value",
        }
    }

    /// Path of the nearest key that must be reconciled in relation to this
    /// resource: the parent key for keys, the holding key for values.
    pub fn owner_path(&self) -> Option<RegistryPath> {
        match self {
            Resource::Key(key) => key.parent_path(),
            Resource::Value(value) => Some(value.key_path()),
        }
    }
}

impl From<RegistryKeyResource> for Resource {
    fn from(key: RegistryKeyResource) -> Self {
        Resource::Key(key)
    }
}

impl From<RegistryValueResource> for Resource {
    fn from(value: RegistryValueResource) -> Self {
        Resource::Value(value)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.type_name(), self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parent_path() {
        let key = RegistryKeyResource::new(r"HKLM\Software\Vendor", Ensure::Present).unwrap();
        assert_eq!(key.parent_path().unwrap().to_string(), r"HKLM\Software");
        assert!(!key.purge_values);
    }

    #[test]
    fn test_value_parts() {
        let value = RegistryValueResource::new(
            r"HKLM\Software\Vendor\Count",
            Ensure::Present,
            ValueKind::Dword,
            &RawData::from("7"),
        )
        .unwrap();
        assert_eq!(value.name(), "Count");
        assert_eq!(value.key_path().to_string(), r"HKLM\Software\Vendor");
        assert_eq!(value.kind(), Some(ValueKind::Dword));
        assert!(!value.is_synthetic());
    }

    #[test]
    fn test_invalid_data_is_validation_error() {
        let err = RegistryValueResource::new(
            r"HKLM\Software\Vendor\Count",
            Ensure::Present,
            ValueKind::Dword,
            &RawData::from("lots"),
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Validation { .. }));
    }

    #[test]
    fn test_purge_value() {
        let key = RegistryKeyResource::new(r"HKLM\Software\Vendor", Ensure::Present).unwrap();
        let value = RegistryValueResource::purge(&key.path, "Stale");
        assert!(value.is_synthetic());
        assert_eq!(value.ensure, Ensure::Absent);
        assert_eq!(value.key_path(), key.path);
        assert_eq!(Resource::from(value).to_string(), r"registry_value[HKLM\Software\Vendor\Stale]");
    }
}
