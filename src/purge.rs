//! Purging of unmanaged values.
//!
//! A key declared with `purge_values` owns every value under it: values
//! that exist in the registry but are not declared are turned into
//! synthetic `ensure=absent` resources and reconciled like any other.

use crate::access::RegistryAccess;
use crate::error::{AccessError, Operation, RegistryError, Result};
use crate::path::fold;
use crate::resource::{RegistryKeyResource, RegistryValueResource};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument};

/// Generates deletions for the values of `key` that are not declared.
///
/// `declared` holds the value resources of this key in the working set.
/// Names are compared ignoring case. The result is sorted by folded name
/// so it does not depend on the registry's enumeration order. A key that
/// does not exist yet (as in a dry run before its creation) has nothing
/// to purge.
///
/// # Errors
///
/// Returns an error if the key's values cannot be listed.
#[instrument(skip(declared, registry), fields(key = %key.path))]
pub fn expand<R: RegistryAccess + ?Sized>(
    key: &RegistryKeyResource,
    declared: &[&RegistryValueResource],
    registry: &R,
) -> Result<Vec<RegistryValueResource>> {
    if !key.purge_values {
        return Ok(Vec::new());
    }

    let declared: HashSet<String> = declared
        .iter()
        .filter(|value| value.key_path() == key.path)
        .map(|value| fold(value.name()))
        .collect();

    let actual = match registry.list_value_names(&key.path) {
        Ok(names) => names,
        Err(AccessError::NotFound) => Vec::new(),
        Err(e) => {
            return Err(RegistryError::access(
                key.path.to_string(),
                Operation::Purge,
                e,
            ))
        }
    };

    // keyed by folded name: sorts the result and drops case-only duplicates
    let stale: BTreeMap<String, String> = actual
        .into_iter()
        .map(|name| (fold(&name), name))
        .filter(|(folded, _)| !declared.contains(folded))
        .collect();

    debug!(
        declared = declared.len(),
        stale = stale.len(),
        "Computed unmanaged values"
    );

    Ok(stale
        .values()
        .map(|name| RegistryValueResource::purge(&key.path, name))
        .collect())
}
