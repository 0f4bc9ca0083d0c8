//! Live registry backend built on the `winreg` crate.

use super::{split_value_path, AccessResult, RegistryAccess};
use crate::error::AccessError;
use crate::path::{Hive, RegistryPath, View};
use crate::value::{RawValue, ValueType};
use std::io;
use tracing::debug;
use winreg::enums::{
    RegType, HKEY_CLASSES_ROOT, HKEY_LOCAL_MACHINE, KEY_ALL_ACCESS, KEY_READ, KEY_WOW64_32KEY,
    KEY_WOW64_64KEY,
};
use winreg::{RegKey, RegValue};

/// The registry of the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    /// Creates a handle to the local registry.
    pub fn new() -> Self {
        Self
    }

    fn root(hive: Hive) -> RegKey {
        match hive {
            Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            Hive::ClassesRoot => RegKey::predef(HKEY_CLASSES_ROOT),
        }
    }

    fn view_flags(view: View) -> u32 {
        match view {
            View::Default => 0,
            View::Bits32 => KEY_WOW64_32KEY,
            View::Bits64 => KEY_WOW64_64KEY,
        }
    }

    fn open(path: &RegistryPath, access: u32) -> io::Result<RegKey> {
        let root = Self::root(path.hive());
        if path.is_root() {
            return Ok(root);
        }
        root.open_subkey_with_flags(path.subkey(), access | Self::view_flags(path.view()))
    }
}

fn access_error(e: io::Error) -> AccessError {
    match e.kind() {
        io::ErrorKind::NotFound => AccessError::NotFound,
        io::ErrorKind::PermissionDenied => AccessError::PermissionDenied,
        _ => AccessError::Io(e),
    }
}

fn reg_type(value_type: ValueType) -> Option<RegType> {
    let reg_type = match value_type {
        ValueType::None => RegType::REG_NONE,
        ValueType::String => RegType::REG_SZ,
        ValueType::ExpandString => RegType::REG_EXPAND_SZ,
        ValueType::Binary => RegType::REG_BINARY,
        ValueType::Dword => RegType::REG_DWORD,
        ValueType::DwordBigEndian => RegType::REG_DWORD_BIG_ENDIAN,
        ValueType::Link => RegType::REG_LINK,
        ValueType::MultiString => RegType::REG_MULTI_SZ,
        ValueType::ResourceList => RegType::REG_RESOURCE_LIST,
        ValueType::FullResourceDescriptor => RegType::REG_FULL_RESOURCE_DESCRIPTOR,
        ValueType::ResourceRequirementsList => RegType::REG_RESOURCE_REQUIREMENTS_LIST,
        ValueType::Qword => RegType::REG_QWORD,
        ValueType::Unknown(_) => return None,
    };
    Some(reg_type)
}

impl RegistryAccess for WindowsRegistry {
    fn key_exists(&self, path: &RegistryPath) -> AccessResult<bool> {
        match Self::open(path, KEY_READ) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(access_error(e)),
        }
    }

    fn create_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        if path.is_root() {
            return Ok(());
        }
        Self::root(path.hive())
            .create_subkey_with_flags(path.subkey(), KEY_ALL_ACCESS | Self::view_flags(path.view()))
            .map_err(access_error)?;
        debug!(
            hive = path.hive().long_name(),
            subkey = %path.subkey(),
            view = ?path.view(),
            "Created key"
        );
        Ok(())
    }

    fn delete_key(&mut self, path: &RegistryPath) -> AccessResult<()> {
        if path.is_root() {
            return Err(AccessError::CannotDeleteRoot);
        }
        let key = Self::open(path, KEY_READ).map_err(access_error)?;
        if key.enum_keys().next().is_some() {
            return Err(AccessError::HasSubkeys);
        }
        drop(key);

        Self::root(path.hive())
            .delete_subkey_with_flags(path.subkey(), Self::view_flags(path.view()))
            .map_err(access_error)
    }

    fn list_subkeys(&self, path: &RegistryPath) -> AccessResult<Vec<String>> {
        let key = Self::open(path, KEY_READ).map_err(access_error)?;
        key.enum_keys()
            .collect::<io::Result<Vec<String>>>()
            .map_err(access_error)
    }

    fn list_value_names(&self, path: &RegistryPath) -> AccessResult<Vec<String>> {
        let key = Self::open(path, KEY_READ).map_err(access_error)?;
        key.enum_values()
            .map(|entry| entry.map(|(name, _)| name))
            .collect::<io::Result<Vec<String>>>()
            .map_err(access_error)
    }

    fn get_value(&self, path: &RegistryPath) -> AccessResult<Option<RawValue>> {
        let (key_path, name) = split_value_path(path);
        let key = match Self::open(&key_path, KEY_READ) {
            Ok(key) => key,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(access_error(e)),
        };

        match key.get_raw_value(name) {
            Ok(value) => Ok(Some(RawValue::new(
                ValueType::from_u32(value.vtype as u32),
                value.bytes,
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(access_error(e)),
        }
    }

    fn set_value(&mut self, path: &RegistryPath, value: &RawValue) -> AccessResult<()> {
        let vtype = reg_type(value.value_type).ok_or_else(|| {
            AccessError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot write {}", value.value_type.name()),
            ))
        })?;
        let (key_path, name) = split_value_path(path);
        let key = Self::open(&key_path, KEY_ALL_ACCESS).map_err(access_error)?;
        key.set_raw_value(
            name,
            &RegValue {
                bytes: value.bytes.clone(),
                vtype,
            },
        )
        .map_err(access_error)
    }

    fn delete_value(&mut self, path: &RegistryPath) -> AccessResult<()> {
        let (key_path, name) = split_value_path(path);
        let key = Self::open(&key_path, KEY_ALL_ACCESS).map_err(access_error)?;
        key.delete_value(name).map_err(access_error)
    }
}
