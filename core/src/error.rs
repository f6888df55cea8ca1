//! Error taxonomy for node operations.
//!
//! Every fallible operation in the crate returns [`DataError`]. Callbacks
//! supplied by callers (computed/lazy/method/view functions, watchers) return
//! [`CallbackError`] so that `?` works on both `DataError` and foreign errors
//! inside them.

use std::fmt;

use thiserror::Error;

/// Error type returned by caller-supplied callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, DataError>;

// ---------------------------------------------------------------------------
// EvalKind
// ---------------------------------------------------------------------------

/// Which kind of evaluation raised a [`DataError::Computation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalKind {
    Computed,
    Lazy,
    Method,
    View,
}

impl EvalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalKind::Computed => "computed",
            EvalKind::Lazy => "lazy",
            EvalKind::Method => "method",
            EvalKind::View => "view",
        }
    }
}

impl fmt::Display for EvalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DataError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DataError {
    /// A key that is not a valid identifier was offered for insertion.
    #[error("invalid key {key:?} (must be a valid identifier)")]
    InvalidKey { key: String },

    #[error("no such key: '{key}'")]
    MissingKey { key: String },

    #[error("key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A computed, lazy, method or view function failed.
    #[error("{kind} evaluation of '{key}' failed: {source}")]
    Computation {
        key: String,
        kind: EvalKind,
        #[source]
        source: CallbackError,
    },

    /// Starting, or rolling back, a transaction failed.
    #[error("transaction error: {message}")]
    Transaction { message: String },

    #[error("path error at '{path}': {message}")]
    Path { path: String, message: String },

    #[error("cannot serialize '{path}': {message}")]
    Serialization { path: String, message: String },

    /// Mutation of a non-exempted key on a frozen node.
    #[error("node is frozen (cannot modify '{key}')")]
    Frozen { key: String },

    /// Mutation of a frozen container value.
    #[error("{kind} is immutable")]
    ImmutableValue { kind: &'static str },

    #[error("cannot freeze '{path}': {message}")]
    Freeze { path: String, message: String },

    #[error("'{key}' is not a method")]
    NotCallable { key: String },

    #[error("view has no field '{name}'")]
    UnknownField { name: String },

    #[error("settings error: {message}")]
    Config { message: String },
}

impl DataError {
    /// True for both flavours of "mutation of something frozen".
    pub fn is_immutability(&self) -> bool {
        matches!(self, DataError::Frozen { .. } | DataError::ImmutableValue { .. })
    }

    pub(crate) fn computation(key: &str, kind: EvalKind, source: CallbackError) -> Self {
        DataError::Computation {
            key: key.to_string(),
            kind,
            source,
        }
    }

    pub(crate) fn transaction(message: impl Into<String>) -> Self {
        DataError::Transaction {
            message: message.into(),
        }
    }

    pub(crate) fn path(path: &str, message: impl Into<String>) -> Self {
        DataError::Path {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn serialization(path: &str, message: impl Into<String>) -> Self {
        DataError::Serialization {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        DataError::Config {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
