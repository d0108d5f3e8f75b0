//! Snap model error types.

use thiserror::Error;

/// Snap model errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A snap, app, hook, plug or slot name is malformed.
    #[error("invalid {kind} name {name:?}")]
    InvalidName { kind: &'static str, name: String },

    /// An attribute declaration is malformed.
    #[error("invalid attribute {name:?}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    /// An attribute was looked up but is not declared.
    #[error("cannot find attribute {name:?}")]
    AttributeNotFound { name: String },

    /// An attribute was looked up with the wrong expected type.
    #[error("attribute {name:?} is a {found}, expected {expected}")]
    AttributeType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A plug or slot reference could not be parsed.
    #[error("invalid reference {0:?}: expected <snap>:<name>")]
    InvalidReference(String),

    /// Snap metadata could not be parsed.
    #[error("failed to parse snap metadata: {0}")]
    Parse(String),

    /// An I/O error occurred while reading snap metadata.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
