//! In-process registry backend.
//!
//! Keys form a tree per hive and view. Names are matched ignoring case
//! but stored with the case they were created with, as the registry does.
//! The default view and the 64-bit view share one tree; the 32-bit view
//! has its own.

use super::{split_value_path, AccessResult, RegistryAccess};
use crate::error::AccessError;
use crate::path::{fold, Hive, RegistryPath, View};
use crate::value::RawValue;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct MemoryKey {
    name: String,
    subkeys: BTreeMap<String, MemoryKey>,
    values: BTreeMap<String, (String, RawValue)>,
    protected: bool,
}

impl MemoryKey {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn writable(&self) -> AccessResult<()> {
        if self.protected {
            return Err(AccessError::PermissionDenied);
        }
        Ok(())
    }
}

/// A registry held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    roots: HashMap<(Hive, View), MemoryKey>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Creates a registry containing only the empty hive roots.
    pub fn new() -> Self {
        let mut roots = HashMap::new();
        for hive in [Hive::LocalMachine, Hive::ClassesRoot] {
            for view in [View::Bits32, View::Bits64] {
                roots.insert((hive, view), MemoryKey::new(hive.short_name()));
            }
        }
        Self { roots }
    }

    /// Makes the key refuse every write to itself, its values and its
    /// direct subkey list.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::NotFound`] if the key does not exist.
    pub fn protect(&mut self, path: &RegistryPath) -> AccessResult<()> {
        let key = self.find_mut(path).ok_or(AccessError::NotFound)?;
        key.protected = true;
        Ok(())
    }

    /// Total number of keys below the hive roots.
    pub fn key_count(&self) -> usize {
        fn count(key: &MemoryKey) -> usize {
            key.subkeys.values().map(|k| 1 + count(k)).sum()
        }
        self.roots.values().map(count).sum()
    }

    fn tree(view: View) -> View {
        match view {
            View::Bits32 => View::Bits32,
            View::Default | View::Bits64 => View::Bits64,
        }
    }

    fn find(&self, path: &RegistryPath) -> Option<&MemoryKey> {
        let mut key = self.roots.get(&(path.hive(), Self::tree(path.view())))?;
        for segment in path.segments() {
            key = key.subkeys.get(&fold(segment))?;
        }
        Some(key)
    }

    fn find_mut(&mut self, path: &RegistryPath) -> Option<&mut MemoryKey> {
        let mut key = self.roots.get_mut(&(path.hive(), Self::tree(path.view())))?;
        for segment in path.segments() {
            key = key.subkeys.get_mut(&fold(segment))?;
        }
        Some(key)
    }
}

impl RegistryAccess for MemoryRegistry {
    fn key_exists(&self, path: &RegistryPath) -> AccessResult<bool> {
        Ok(self.find(path).is_some())
    }

    fn create_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        let mut key = self
            .roots
            .get_mut(&(path.hive(), Self::tree(path.view())))
            .ok_or(AccessError::NotFound)?;

        for segment in path.segments() {
            let folded = fold(segment);
            if !key.subkeys.contains_key(&folded) {
                key.writable()?;
                debug!(parent = %key.name, name = %segment, "Creating key");
                key.subkeys.insert(folded.clone(), MemoryKey::new(segment));
            }
            key = key.subkeys.get_mut(&folded).ok_or(AccessError::NotFound)?;
        }
        Ok(())
    }

    fn delete_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        let parent_path = path.parent().ok_or(AccessError::CannotDeleteRoot)?;
        let name = fold(path.leaf().unwrap_or_default());

        let parent = self.find_mut(&parent_path).ok_or(AccessError::NotFound)?;
        let key = parent.subkeys.get(&name).ok_or(AccessError::NotFound)?;
        if !key.subkeys.is_empty() {
            return Err(AccessError::HasSubkeys);
        }
        key.writable()?;
        parent.writable()?;

        parent.subkeys.remove(&name);
        Ok(())
    }

    fn list_subkeys(&self, path: &RegistryPath) -> AccessResult<Vec<String>> {
        let key = self.find(path).ok_or(AccessError::NotFound)?;
        Ok(key.subkeys.values().map(|k| k.name.clone()).collect())
    }

    fn list_value_names(&self, path: &RegistryPath) -> AccessResult<Vec<String>> {
        let key = self.find(path).ok_or(AccessError::NotFound)?;
        Ok(key.values.values().map(|(name, _)| name.clone()).collect())
    }

    fn get_value(&self, path: &RegistryPath) -> AccessResult<Option<RawValue>> {
        let (key_path, name) = split_value_path(path);
        Ok(self
            .find(&key_path)
            .and_then(|key| key.values.get(&fold(name)))
            .map(|(_, value)| value.clone()))
    }

    fn set_value(&mut self, path: &RegistryPath, value: &RawValue) -> AccessResult<()> {
        let (key_path, name) = split_value_path(path);
        let key = self.find_mut(&key_path).ok_or(AccessError::NotFound)?;
        key.writable()?;

        // an existing value keeps the case of its original name
        let folded = fold(name);
        let stored_name = key
            .values
            .get(&folded)
            .map(|(existing, _)| existing.clone())
            .unwrap_or_else(|| name.to_string());
        key.values.insert(folded, (stored_name, value.clone()));
        Ok(())
    }

    fn delete_value(&mut self, path: &RegistryPath) -> AccessResult<()> {
        let (key_path, name) = split_value_path(path);
        let key = self.find_mut(&key_path).ok_or(AccessError::NotFound)?;
        key.writable()?;
        key.values
            .remove(&fold(name))
            .map(|_| ())
            .ok_or(AccessError::NotFound)
    }
}
