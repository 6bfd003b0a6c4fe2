//! Domain errors raised by the mock model and the schema registry.
//!
//! Both enums derive `thiserror` with structured fields so callers can match
//! on the failure. Mock errors are local: the transformer records them and
//! leaves the offending node alone. Registry errors reject the whole request.

use thiserror::Error;

use crate::value::EvalError;

/// Errors raised while resolving or invoking a mock value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MockError {
    /// The mock has no behaviour to invoke.
    #[error("mock '{name}' is not callable")]
    NotCallable {
        /// Symbolic name of the mock.
        name: String,
    },

    /// The item table has no entry for the key.
    #[error("key '{key}' not found in '{name}'")]
    KeyNotFound {
        /// Symbolic name of the mock.
        name: String,
        /// Key that was looked up.
        key: String,
    },

    /// The mock exposes no member with this name.
    #[error("attribute '{attr}' not found on '{name}'")]
    AttrNotFound {
        /// Symbolic name of the mock.
        name: String,
        /// Attribute that was looked up.
        attr: String,
    },

    /// A native value has no mock representation.
    #[error("values of type '{type_name}' cannot be mocked")]
    UnsupportedType {
        /// Python type name of the rejected value.
        type_name: String,
    },

    /// A behaviour rejected the arguments it was called with.
    #[error("invalid arguments for '{name}': {message}")]
    InvalidArguments {
        /// Symbolic name of the callee.
        name: String,
        /// Description of the mismatch.
        message: String,
    },

    /// Evaluating the behaviour on concrete values failed.
    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

impl MockError {
    /// Creates a [`MockError::NotCallable`].
    #[must_use]
    pub fn not_callable(name: impl Into<String>) -> Self {
        Self::NotCallable { name: name.into() }
    }

    /// Creates a [`MockError::KeyNotFound`].
    #[must_use]
    pub fn key_not_found(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self::KeyNotFound {
            name: name.into(),
            key: key.into(),
        }
    }

    /// Creates a [`MockError::AttrNotFound`].
    #[must_use]
    pub fn attr_not_found(name: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::AttrNotFound {
            name: name.into(),
            attr: attr.into(),
        }
    }

    /// Creates a [`MockError::UnsupportedType`].
    #[must_use]
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Creates a [`MockError::InvalidArguments`].
    #[must_use]
    pub fn invalid_arguments(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the schema registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// An entry with the same name and version is already registered.
    #[error("schema '{name}' version {version} is already registered")]
    DuplicateVersion {
        /// Normalised schema name.
        name: String,
        /// Schema version.
        version: u32,
    },

    /// A token of the selection string is malformed.
    #[error("invalid schema option '{option}': {reason}")]
    InvalidSchemaOption {
        /// The offending token, as written.
        option: String,
        /// Why the token was rejected.
        reason: String,
    },

    /// No schema is registered under the normalised name.
    #[error("unknown schema '{name}'")]
    UnknownSchema {
        /// Normalised schema name.
        name: String,
    },

    /// The schema exists but not at the requested version.
    #[error("schema '{name}' has no version {version}")]
    UnknownVersion {
        /// Normalised schema name.
        name: String,
        /// Requested version.
        version: u32,
    },
}

impl RegistryError {
    /// Creates a [`RegistryError::InvalidSchemaOption`].
    #[must_use]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchemaOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Creates a [`RegistryError::UnknownSchema`].
    #[must_use]
    pub fn unknown_schema(name: impl Into<String>) -> Self {
        Self::UnknownSchema { name: name.into() }
    }
}
