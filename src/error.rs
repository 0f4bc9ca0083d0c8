//! Error types for registry reconciliation.
//!
//! Each failure family has its own enum so callers can match on the exact
//! cause. [`RegistryError`] wraps them together with the path of the
//! resource involved and the operation that was being attempted.

use crate::codec::ValueKind;
use crate::value::ValueType;
use serde::Serialize;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// The operation that was in progress when an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Loading and validating declared configuration.
    Load,
    /// Reading current registry state.
    Query,
    /// Creating a key or value.
    Create,
    /// Overwriting an existing value.
    Update,
    /// Deleting a key or value.
    Delete,
    /// Enumerating unmanaged values for purging.
    Purge,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Query => "query",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Purge => "purge",
        };
        f.write_str(name)
    }
}

/// Malformed or unsupported registry path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The path string was empty.
    #[error("Empty registry path")]
    Empty,

    /// The root of the path is not a supported hive.
    #[error("Unsupported hive: {0}")]
    UnsupportedHive(String),

    /// Two separators with nothing between them, or a trailing separator on a key.
    #[error("Empty key name in path: {0}")]
    EmptySegment(String),

    /// A value path with nothing after the hive.
    #[error("Missing value name in path: {0}")]
    MissingValueName(String),
}

/// Data that does not satisfy the encoding contract of its value kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not an integer, or its magnitude needs more than 32 bits.
    #[error("The data must be a valid DWORD: {0}")]
    NotAValidDword(String),

    /// Not an integer, or its magnitude needs more than 64 bits.
    #[error("The data must be a valid QWORD: {0}")]
    NotAValidQword(String),

    /// Not a sequence of hex digit pairs.
    #[error("The data must be a hex encoded string of the form '00 01 02 ...': {0}")]
    NotAValidHex(String),

    /// An array element REG_MULTI_SZ cannot store (empty or containing NUL).
    #[error("The data must be a list of non-empty strings without NUL characters: {0:?}")]
    NotAValidArray(String),

    /// String data containing a NUL character.
    #[error("The data must be a string without NUL characters: {0:?}")]
    NotAValidString(String),

    /// A list with more than one element given for a scalar kind.
    #[error("The data for a {kind} value must be a single item, got {len}")]
    UnexpectedArray {
        /// Declared value kind.
        kind: ValueKind,
        /// Number of elements supplied.
        len: usize,
    },
}

/// Declared configuration that can never be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A key resource addressing the hive root itself was asked to be absent.
    #[error("Cannot delete root key")]
    CannotDeleteRootKey,

    /// `purge_values` was not a boolean-like literal.
    #[error("purge_values must be true or false, not {0}")]
    InvalidPurgeValues(String),

    /// The declared entry could not be decoded at all.
    #[error("Malformed resource declaration: {0}")]
    Malformed(String),

    /// The same resource was declared more than once.
    #[error("Duplicate declaration")]
    DuplicateResource,

    /// A value resource asked to be present without any data.
    #[error("No data to write")]
    MissingValueData,
}

/// Failure reported by the registry access capability.
#[derive(Error, Debug)]
pub enum AccessError {
    /// The key or value does not exist.
    #[error("Not found")]
    NotFound,

    /// The key still has subkeys; deletion is never recursive.
    #[error("Key has subkeys")]
    HasSubkeys,

    /// The key is a hive root.
    #[error("Cannot delete a hive root")]
    CannotDeleteRoot,

    /// Access was denied by the registry.
    #[error("Permission denied")]
    PermissionDenied,

    /// Any other I/O failure from the underlying registry API.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Raw registry bytes that do not decode into a supported value kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the type requires.
    #[error("Truncated data: expected {expected} bytes, got {actual} bytes")]
    Truncated {
        /// Bytes required.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },

    /// Odd length or invalid UTF-16 sequence.
    #[error("Invalid UTF-16 string data")]
    InvalidUtf16,

    /// A registry type that has no value kind counterpart.
    #[error("Unsupported value type: {}", .0.name())]
    UnsupportedType(ValueType),
}

/// Errors surfaced for a single resource.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The declared path could not be parsed.
    #[error("{path}: invalid path: {source}")]
    Parse {
        /// Path as declared.
        path: String,
        /// Underlying cause.
        #[source]
        source: ParseError,
    },

    /// The declared data failed validation.
    #[error("{path}: invalid data: {source}")]
    Validation {
        /// Path as declared.
        path: String,
        /// Underlying cause.
        #[source]
        source: ValidationError,
    },

    /// The declaration is valid in shape but cannot be applied.
    #[error("{path}: cannot {operation}: {source}")]
    Configuration {
        /// Path of the resource.
        path: String,
        /// Operation that was refused.
        operation: Operation,
        /// Underlying cause.
        #[source]
        source: ConfigurationError,
    },

    /// The registry rejected an operation.
    #[error("{path}: {operation} failed: {source}")]
    Access {
        /// Path of the resource.
        path: String,
        /// Operation that failed.
        operation: Operation,
        /// Underlying cause.
        #[source]
        source: AccessError,
    },
}

impl RegistryError {
    /// Creates a parse error for a declared path.
    pub fn parse(path: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Creates a validation error for a declared path.
    pub fn validation(path: impl Into<String>, source: ValidationError) -> Self {
        Self::Validation {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error with context.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_reconcile::error::{ConfigurationError, Operation, RegistryError};
    /// let err = RegistryError::configuration(
    ///     "HKLM",
    ///     Operation::Delete,
    ///     ConfigurationError::CannotDeleteRootKey,
    /// );
    /// assert_eq!(err.to_string(), "HKLM: cannot delete: Cannot delete root key");
    /// ```
    pub fn configuration(
        path: impl Into<String>,
        operation: Operation,
        source: ConfigurationError,
    ) -> Self {
        Self::Configuration {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Creates an access error with context.
    pub fn access(path: impl Into<String>, operation: Operation, source: AccessError) -> Self {
        Self::Access {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Returns the path of the resource the error belongs to.
    pub fn path(&self) -> &str {
        match self {
            Self::Parse { path, .. }
            | Self::Validation { path, .. }
            | Self::Configuration { path, .. }
            | Self::Access { path, .. } => path,
        }
    }

    /// Returns the operation that was being attempted.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Parse { .. } | Self::Validation { .. } => Operation::Load,
            Self::Configuration { operation, .. } | Self::Access { operation, .. } => *operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let err = RegistryError::access(
            r"HKLM\Software\Vendor",
            Operation::Delete,
            AccessError::HasSubkeys,
        );
        assert_eq!(err.path(), r"HKLM\Software\Vendor");
        assert_eq!(err.operation(), Operation::Delete);
        assert_eq!(
            err.to_string(),
            r"HKLM\Software\Vendor: delete failed: Key has subkeys"
        );
    }

    #[test]
    fn test_load_errors_report_load_operation() {
        let err = RegistryError::validation(
            r"HKLM\Software\Count",
            ValidationError::NotAValidDword("abc".to_string()),
        );
        assert_eq!(err.operation(), Operation::Load);
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_io_conversion() {
        let io = io::Error::new(io::ErrorKind::Other, "boom");
        let err: AccessError = io.into();
        assert!(matches!(err, AccessError::Io(_)));
    }
}
