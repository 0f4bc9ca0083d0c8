//! Desired-versus-actual reconciliation of a single resource.
//!
//! Keys and values each follow a small state machine: the current state
//! (present or absent, and for values the current data) is read through
//! [`RegistryAccess`], compared with the declaration, and turned into one
//! [`Action`]. Planning is read-only; applying performs exactly the writes
//! the action calls for.

use crate::access::RegistryAccess;
use crate::codec::ValueData;
use crate::error::{AccessError, ConfigurationError, Operation, RegistryError, Result};
use crate::resource::{Ensure, RegistryKeyResource, RegistryValueResource, Resource};
use crate::value::RawValue;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, instrument};

/// What reconciling a resource requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Already in the desired state.
    Noop,
    /// Create the missing key or value.
    Create,
    /// Overwrite the value's type and data.
    Update,
    /// Delete the key or value.
    Delete,
}

impl Action {
    fn operation(&self) -> Operation {
        match self {
            Action::Noop => Operation::Query,
            Action::Create => Operation::Create,
            Action::Update => Operation::Update,
            Action::Delete => Operation::Delete,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Noop => "noop",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Description of a state change, e.g. `REG_SZ old -> REG_DWORD 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// State before the change.
    pub from: String,
    /// State after the change.
    pub to: String,
}

impl Change {
    fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// The planned or applied outcome for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Action required.
    pub action: Action,
    /// What the action changes; `None` for no-ops.
    pub change: Option<Change>,
}

impl Reconciliation {
    fn noop() -> Self {
        Self {
            action: Action::Noop,
            change: None,
        }
    }

    fn new(action: Action, change: Change) -> Self {
        Self {
            action,
            change: Some(change),
        }
    }
}

/// Reconciles resources against a registry.
pub struct Reconciler<'a, R: RegistryAccess + ?Sized> {
    registry: &'a mut R,
}

impl<'a, R: RegistryAccess + ?Sized> Reconciler<'a, R> {
    /// Creates a reconciler working on `registry`.
    pub fn new(registry: &'a mut R) -> Self {
        Self { registry }
    }

    /// Read access to the underlying registry.
    pub fn registry(&self) -> &R {
        &*self.registry
    }

    /// Determines the action a resource needs without changing anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be queried or the resource
    /// can never be applied (deleting a hive root).
    pub fn plan(&self, resource: &Resource) -> Result<Reconciliation> {
        match resource {
            Resource::Key(key) => self.plan_key(key),
            Resource::Value(value) => self.plan_value(value),
        }
    }

    /// Determines and performs the action a resource needs.
    ///
    /// # Errors
    ///
    /// Returns an error if planning fails or the registry rejects the write.
    /// Nothing is retried.
    #[instrument(skip(self, resource), fields(resource = %resource))]
    pub fn reconcile(&mut self, resource: &Resource) -> Result<Reconciliation> {
        let plan = self.plan(resource)?;
        self.apply(resource, &plan)?;
        Ok(plan)
    }

    /// Performs a previously planned action.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry rejects the write.
    pub fn apply(&mut self, resource: &Resource, plan: &Reconciliation) -> Result<()> {
        if plan.action == Action::Noop {
            debug!("Already in desired state");
            return Ok(());
        }

        let operation = plan.action.operation();
        let path = resource.path();
        let wrap = |e: AccessError| RegistryError::access(path.to_string(), operation, e);

        match (resource, plan.action) {
            (Resource::Key(_), Action::Create) => self.registry.create_key(path).map_err(wrap)?,
            (Resource::Key(_), Action::Delete) => {
                // never recursive: refuse before asking the registry
                if !self.registry.list_subkeys(path).map_err(wrap)?.is_empty() {
                    return Err(wrap(AccessError::HasSubkeys));
                }
                self.registry.delete_key(path).map_err(wrap)?
            }
            (Resource::Value(value), Action::Create | Action::Update) => {
                let data = desired_data(value, operation)?;
                self.registry
                    .set_value(path, &RawValue::encode(data))
                    .map_err(wrap)?
            }
            (Resource::Value(_), Action::Delete) => self.registry.delete_value(path).map_err(wrap)?,
            (Resource::Key(_), Action::Update) | (_, Action::Noop) => {}
        }

        match &plan.change {
            Some(change) => info!(action = %plan.action, %change, "Applied"),
            None => info!(action = %plan.action, "Applied"),
        }
        Ok(())
    }

    fn plan_key(&self, key: &RegistryKeyResource) -> Result<Reconciliation> {
        if key.ensure == Ensure::Absent && key.path.is_root() {
            return Err(RegistryError::configuration(
                key.path.to_string(),
                Operation::Delete,
                ConfigurationError::CannotDeleteRootKey,
            ));
        }

        let exists = self
            .registry
            .key_exists(&key.path)
            .map_err(|e| RegistryError::access(key.path.to_string(), Operation::Query, e))?;
        debug!(path = %key.path, exists, "Queried key");

        Ok(match (key.ensure, exists) {
            (Ensure::Present, false) => {
                Reconciliation::new(Action::Create, Change::new("absent", "present"))
            }
            (Ensure::Absent, true) => {
                Reconciliation::new(Action::Delete, Change::new("present", "absent"))
            }
            _ => Reconciliation::noop(),
        })
    }

    fn plan_value(&self, value: &RegistryValueResource) -> Result<Reconciliation> {
        let current = self
            .registry
            .get_value(&value.path)
            .map_err(|e| RegistryError::access(value.path.to_string(), Operation::Query, e))?;
        debug!(path = %value.path, present = current.is_some(), "Queried value");

        match (value.ensure, current) {
            (Ensure::Present, None) => {
                let desired = desired_data(value, Operation::Create)?;
                Ok(Reconciliation::new(
                    Action::Create,
                    Change::new("absent", RawValue::encode(desired).to_string()),
                ))
            }
            (Ensure::Present, Some(raw)) => {
                let desired = desired_data(value, Operation::Update)?;
                let in_sync = match raw.decode() {
                    Ok(current) => current.matches(desired),
                    Err(e) => {
                        debug!(error = %e, "Current value is not decodable, will overwrite");
                        false
                    }
                };
                if in_sync {
                    Ok(Reconciliation::noop())
                } else {
                    Ok(Reconciliation::new(
                        Action::Update,
                        Change::new(raw.to_string(), RawValue::encode(desired).to_string()),
                    ))
                }
            }
            (Ensure::Absent, Some(raw)) => Ok(Reconciliation::new(
                Action::Delete,
                Change::new(raw.to_string(), "absent"),
            )),
            (Ensure::Absent, None) => Ok(Reconciliation::noop()),
        }
    }
}

fn desired_data(value: &RegistryValueResource, operation: Operation) -> Result<&ValueData> {
    value.data.as_ref().ok_or_else(|| {
        RegistryError::configuration(
            value.path.to_string(),
            operation,
            ConfigurationError::MissingValueData,
        )
    })
}
