//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// These are raised while building a base declaration. Evaluation itself
/// never fails: an unmet constraint is a deny verdict, not an error.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Rule text is malformed.
    #[error("failed to parse base declaration for {interface}: {reason}")]
    Parse { interface: String, reason: String },

    /// An attribute pattern is not a valid regular expression.
    #[error("invalid attribute pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Rule text for one interface is keyed by another.
    #[error("base declaration for {expected} is keyed by {found:?}")]
    InterfaceMismatch { expected: String, found: String },

    /// Rules for an interface were added twice.
    #[error("base declaration for {0} already registered")]
    Duplicate(String),
}

pub type Result<T> = std::result::Result<T, Error>;
