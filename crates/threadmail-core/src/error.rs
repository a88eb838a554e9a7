//! Error types for Threadmail
//!
//! These cover validation of domain values. Store failures live in
//! `threadmail-db`.

use thiserror::Error;

/// Result type alias for Threadmail core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Threadmail core
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A lifecycle event that is not defined for the current state.
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// A stored or supplied string that does not name a known variant.
    #[error("Unknown {field} value: {value:?}")]
    UnknownValue { field: &'static str, value: String },
}

impl Error {
    pub fn unknown(field: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownValue {
            field,
            value: value.into(),
        }
    }

    /// The error code string for this error.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) | Self::UnknownValue { .. } => "INVALID_ARGUMENT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}
