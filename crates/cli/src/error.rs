//! CLI error types.

use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A `--connect` argument is not `<snap>:<plug>=<snap>:<slot>`.
    #[error("invalid connection {0:?}: expected <snap>:<plug>=<snap>:<slot>")]
    InvalidConnection(String),

    /// One or more snaps failed validation.
    #[error("{failed} of {total} snaps failed validation")]
    ValidationFailed { failed: usize, total: usize },

    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// An error occurred in the interface engine.
    #[error(transparent)]
    Interfaces(#[from] interfaces::Error),

    /// An error occurred loading snap metadata.
    #[error(transparent)]
    Snap(#[from] snap::Error),

    /// Output could not be serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
