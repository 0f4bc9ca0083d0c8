//! Registry access capability.
//!
//! The reconciler never talks to the registry directly; it goes through
//! [`RegistryAccess`], which exposes the handful of primitive operations it
//! needs. Two backends are provided: [`MemoryRegistry`], an in-process
//! tree, and (on Windows) `WindowsRegistry`, backed by the live registry.
//!
//! All operations are blocking. Value paths are [`RegistryPath`]s whose last
//! segment is the value name.

use crate::error::AccessError;
use crate::path::RegistryPath;
use crate::value::RawValue;

pub mod memory;
#[cfg(windows)]
pub mod windows;

pub use memory::MemoryRegistry;
#[cfg(windows)]
pub use windows::WindowsRegistry;

/// Result type alias for registry access operations.
pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// Primitive registry operations.
pub trait RegistryAccess {
    /// Returns true if the key exists.
    fn key_exists(&self, path: &RegistryPath) -> AccessResult<bool>;

    /// Creates the key and any missing parents. Succeeds if it already exists.
    fn create_key(&mut self, path: &RegistryPath) -> AccessResult<()>;

    /// Deletes an empty key.
    ///
    /// Fails with [`AccessError::HasSubkeys`] if the key has subkeys and with
    /// [`AccessError::CannotDeleteRoot`] for a hive root.
    fn delete_key(&mut self, path: &RegistryPath) -> AccessResult<()>;

    /// Names of the key's direct subkeys.
    fn list_subkeys(&self, path: &RegistryPath) -> AccessResult<Vec<String>>;

    /// Names of the key's values; the default value is listed as `""` when set.
    fn list_value_names(&self, path: &RegistryPath) -> AccessResult<Vec<String>>;

    /// Reads a value; `None` if the value or its key does not exist.
    fn get_value(&self, path: &RegistryPath) -> AccessResult<Option<RawValue>>;

    /// Writes a value, replacing any existing value and type.
    fn set_value(&mut self, path: &RegistryPath, value: &RawValue) -> AccessResult<()>;

    /// Deletes a value. Fails with [`AccessError::NotFound`] if it does not exist.
    fn delete_value(&mut self, path: &RegistryPath) -> AccessResult<()>;
}

/// Splits a value path into its key path and value name.
pub(crate) fn split_value_path(path: &RegistryPath) -> (RegistryPath, &str) {
    let name = path.leaf().unwrap_or_default();
    let key = path.parent().unwrap_or_else(|| path.clone());
    (key, name)
}
