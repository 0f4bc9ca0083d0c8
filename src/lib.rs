//! # Windows Registry Reconciliation
//!
//! Declarative management of Windows registry keys and values: describe the
//! keys and values that should (or should not) exist, and the crate brings
//! the registry into that state, idempotently.
//!
//! ## Features
//!
//! - **Path parsing**: `[32:|64:]HIVE\Segment\...` with case-insensitive hive aliases
//! - **Validated data**: strings, arrays, DWORD/QWORD bounds, canonical binary hex
//! - **Idempotent**: a second run over an unchanged registry performs no writes
//! - **Purging**: optionally delete every value of a key that is not declared
//! - **Safe deletion**: hive roots and keys with subkeys are never deleted
//! - **Pluggable access**: an in-memory backend and, on Windows, the live registry
//!
//! ## Architecture
//!
//! 1. **Paths** (`path`): parse declared path strings into [`RegistryPath`]
//! 2. **Codec** (`codec`, `value`): validate declared data, convert to and from registry bytes
//! 3. **Resources** (`resource`, `config`): load the declared catalog
//! 4. **Access** (`access`): the primitive operations a registry backend provides
//! 5. **Reconciler** (`reconcile`): desired versus actual state, one action per resource
//! 6. **Purge** (`purge`): deletions for undeclared values of a key
//! 7. **Engine** (`graph`, `engine`): ordering, execution and reporting
//!
//! ## Examples
//!
//! ### Running a catalog
//!
//! ```rust
//! use reg_reconcile::{Catalog, Engine, MemoryRegistry, RunOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::from_json(r#"[
//!     {"resource": "registry_key", "path": "HKLM\\Software\\Vendor", "purge_values": true},
//!     {"resource": "registry_value", "path": "HKLM\\Software\\Vendor\\Count",
//!      "type": "dword", "data": "42"}
//! ]"#)?;
//!
//! let mut registry = MemoryRegistry::new();
//! let report = Engine::new(&mut registry).run(&catalog, &RunOptions::default());
//! assert_eq!(report.summary().created, 2);
//!
//! // nothing left to do the second time
//! let report = Engine::new(&mut registry).run(&catalog, &RunOptions::default());
//! assert!(!report.has_changes());
//! # Ok(())
//! # }
//! ```
//!
//! ### Reconciling a single resource
//!
//! ```rust
//! use reg_reconcile::{Action, Ensure, MemoryRegistry, Reconciler, RegistryKeyResource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = RegistryKeyResource::new(r"64:HKLM\Software\Vendor", Ensure::Present)?;
//! let mut registry = MemoryRegistry::new();
//! let mut reconciler = Reconciler::new(&mut registry);
//!
//! assert_eq!(reconciler.reconcile(&key.clone().into())?.action, Action::Create);
//! assert_eq!(reconciler.reconcile(&key.into())?.action, Action::Noop);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod path;
pub mod purge;
pub mod reconcile;
pub mod resource;
pub mod utils;
pub mod value;

// Re-export main types for convenience
pub use access::{MemoryRegistry, RegistryAccess};
#[cfg(windows)]
pub use access::WindowsRegistry;
pub use codec::{RawData, ValueData, ValueKind};
pub use config::Catalog;
pub use engine::{Engine, ResourceOutcome, RunOptions, RunReport, Status, Summary};
pub use error::{RegistryError, Result};
pub use path::{Hive, PathKind, RegistryPath, View};
pub use reconcile::{Action, Change, Reconciler};
pub use resource::{Ensure, RegistryKeyResource, RegistryValueResource, Resource};
pub use value::{RawValue, ValueType};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
