//! Error types for askdb.
//!
//! Defines the main error enum used throughout the gateway. Validation and
//! execution errors are safe to report verbatim; upstream detail is logged
//! and reported by category.

use thiserror::Error;

use crate::safety::RejectCode;

/// Main error type for askdb operations.
#[derive(Error, Debug)]
pub enum AskdbError {
    /// The system catalog could not be read (file missing, corrupt, etc.)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A table name did not match any current catalog entry.
    #[error("Unknown table: '{0}' does not exist in the database")]
    UnknownTable(String),

    /// The candidate query was refused by the validator.
    #[error("Query rejected ({code}): {detail}")]
    Validation { code: RejectCode, detail: String },

    /// The database engine failed to execute an accepted statement.
    #[error("Execution error: {0}")]
    Execution(String),

    /// A generation provider call failed (network, quota, malformed output).
    #[error("Upstream provider error: {message}")]
    Upstream { message: String, transient: bool },

    /// No generation provider could be resolved.
    #[error("No provider available: {0}")]
    NoProvider(String),

    /// An I/O boundary exceeded its time bound.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration errors (bad database URL, unknown provider name, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violations (bugs in orchestration wiring).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AskdbError {
    /// Creates a catalog error with the given message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a transient upstream error (eligible for one retry).
    pub fn upstream_transient(msg: impl Into<String>) -> Self {
        Self::Upstream {
            message: msg.into(),
            transient: true,
        }
    }

    /// Creates a permanent upstream error.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream {
            message: msg.into(),
            transient: false,
        }
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if one bounded retry against the same provider is allowed.
    pub fn is_transient_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream {
                transient: true,
                ..
            } | Self::Timeout(_)
        )
    }

    /// Returns the stable error-code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Catalog(_) => "catalog_unavailable",
            Self::UnknownTable(_) => "unknown_table",
            Self::Validation { .. } => "validation_error",
            Self::Execution(_) => "execution_error",
            Self::Upstream { .. } => "upstream_error",
            Self::NoProvider(_) => "no_provider_available",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns true for errors that are expected request outcomes and safe to
    /// report verbatim to the caller.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Execution(_) | Self::UnknownTable(_)
        )
    }
}

/// Result type alias using AskdbError.
pub type Result<T> = std::result::Result<T, AskdbError>;
