//! Declared configuration loading.
//!
//! The declared resource set is a JSON array of objects tagged by
//! `"resource"`:
//!
//! ```json
//! [
//!   { "resource": "registry_key", "path": "HKLM\\Software\\Vendor", "purge_values": true },
//!   { "resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Count",
//!     "type": "dword", "data": "42" }
//! ]
//! ```
//!
//! Every entry is decoded on its own: an entry with a bad path or bad data
//! is rejected and reported while the remaining entries still load.

use crate::codec::{RawData, ValueKind};
use crate::error::{ConfigurationError, Operation, RegistryError, Result};
use crate::path::RegistryPath;
use crate::resource::{Ensure, RegistryKeyResource, RegistryValueResource, Resource};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, warn};

/// One declared resource, as written in configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum Declaration {
    /// A `registry_key` entry.
    RegistryKey {
        /// Key path.
        path: String,
        /// Desired existence.
        #[serde(default)]
        ensure: Ensure,
        /// Boolean-like purge flag.
        #[serde(default)]
        purge_values: Option<Value>,
    },

    /// A `registry_value` entry.
    RegistryValue {
        /// Value path.
        path: String,
        /// Desired existence.
        #[serde(default)]
        ensure: Ensure,
        /// Value kind.
        #[serde(default, rename = "type")]
        kind: ValueKind,
        /// Raw data.
        #[serde(default)]
        data: Option<RawData>,
    },
}

impl Declaration {
    /// Declared path.
    pub fn path(&self) -> &str {
        match self {
            Declaration::RegistryKey { path, .. } | Declaration::RegistryValue { path, .. } => path,
        }
    }

    /// Validates the declaration into a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the path, the data or the purge flag is invalid.
    pub fn into_resource(self) -> Result<Resource> {
        match self {
            Declaration::RegistryKey {
                path,
                ensure,
                purge_values,
            } => {
                let purge = parse_purge_values(purge_values.as_ref()).map_err(|e| {
                    RegistryError::configuration(path.as_str(), Operation::Load, e)
                })?;
                Ok(RegistryKeyResource::new(&path, ensure)?
                    .with_purge_values(purge)
                    .into())
            }
            Declaration::RegistryValue {
                path,
                ensure,
                kind,
                data,
            } => {
                let data = data.unwrap_or_else(|| RawData::default_for(kind));
                Ok(RegistryValueResource::new(&path, ensure, kind, &data)?.into())
            }
        }
    }
}

/// Interprets a boolean-like `purge_values` literal.
///
/// Accepts `true`/`false`, the strings `"true"`/`"false"` in any case, and
/// `null`, `"undef"` or absence, which mean `false`.
pub fn parse_purge_values(value: Option<&Value>) -> std::result::Result<bool, ConfigurationError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") || s == "undef" => Ok(false),
        Some(other) => Err(ConfigurationError::InvalidPurgeValues(other.to_string())),
    }
}

/// The declared resource set for one run.
#[derive(Debug, Default)]
pub struct Catalog {
    resources: Vec<Resource>,
    rejected: Vec<RegistryError>,
    seen: HashSet<(&'static str, RegistryPath)>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error only if the text is not a JSON array; invalid
    /// entries are collected in [`Catalog::rejected`].
    pub fn from_json(text: &str) -> Result<Self> {
        let entries: Vec<Value> = serde_json::from_str(text).map_err(malformed)?;
        Ok(Self::from_entries(entries))
    }

    /// Loads a catalog from a JSON reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or is not a JSON array.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let entries: Vec<Value> = serde_json::from_reader(reader).map_err(malformed)?;
        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: Vec<Value>) -> Self {
        let mut catalog = Self::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let label = entry
                .get("path")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("<entry {}>", index));

            let declaration: Declaration = match serde_json::from_value(entry) {
                Ok(declaration) => declaration,
                Err(e) => {
                    catalog.reject(RegistryError::configuration(
                        label,
                        Operation::Load,
                        ConfigurationError::Malformed(e.to_string()),
                    ));
                    continue;
                }
            };

            match declaration.into_resource() {
                Ok(resource) => {
                    if let Err(e) = catalog.add(resource) {
                        catalog.reject(e);
                    }
                }
                Err(e) => catalog.reject(e),
            }
        }
        debug!(
            loaded = catalog.resources.len(),
            rejected = catalog.rejected.len(),
            "Loaded catalog"
        );
        catalog
    }

    /// Adds a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource of the same type and path is already
    /// present.
    pub fn add(&mut self, resource: Resource) -> Result<()> {
        let id = (resource.type_name(), resource.path().clone());
        if !self.seen.insert(id) {
            return Err(RegistryError::configuration(
                resource.path().to_string(),
                Operation::Load,
                ConfigurationError::DuplicateResource,
            ));
        }
        self.resources.push(resource);
        Ok(())
    }

    fn reject(&mut self, error: RegistryError) {
        warn!(error = %error, "Rejected declared resource");
        self.rejected.push(error);
    }

    /// Resources that loaded successfully, in declaration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Entries that failed to load.
    pub fn rejected(&self) -> &[RegistryError] {
        &self.rejected
    }

    /// Number of loaded resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resource loaded.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

fn malformed(e: serde_json::Error) -> RegistryError {
    RegistryError::configuration(
        "<catalog>",
        Operation::Load,
        ConfigurationError::Malformed(e.to_string()),
    )
}
