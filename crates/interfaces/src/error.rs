//! Interface engine error types.

use crate::interface::ValidationError;
use snap::{PlugRef, SlotRef};
use thiserror::Error;

/// Interface engine errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A plug or slot failed its interface's attribute validation.
    #[error("invalid {kind} {reference} on interface {interface}: {source}")]
    Validation {
        kind: &'static str,
        reference: String,
        interface: String,
        #[source]
        source: ValidationError,
    },

    /// The base declaration or the interface vetoed a connection.
    #[error("cannot connect {plug} to {slot}: {reason}")]
    ConnectionRefused {
        plug: PlugRef,
        slot: SlotRef,
        reason: String,
    },

    /// The base declaration vetoed installing a declaration.
    #[error("cannot install {snap}: {reason}")]
    InstallationRefused { snap: String, reason: String },

    #[error("unknown interface {0:?}")]
    UnknownInterface(String),

    #[error("interface {0:?} registered twice")]
    DuplicateInterface(String),

    #[error("snap {0:?} is not installed")]
    UnknownSnap(String),

    #[error("snap {0:?} is already installed")]
    SnapExists(String),

    #[error("no plug {0}")]
    UnknownPlug(PlugRef),

    #[error("no slot {0}")]
    UnknownSlot(SlotRef),

    /// A plug can be connected to at most one slot.
    #[error("plug {plug} is already connected to {slot}")]
    PlugAlreadyConnected { plug: PlugRef, slot: SlotRef },

    #[error("{plug} is not connected to {slot}")]
    NotConnected { plug: PlugRef, slot: SlotRef },

    /// A snap cannot be removed while connected.
    #[error("snap {0:?} still has connections")]
    SnapInUse(String),

    /// A snippet was added while no plug or slot hook was running.
    #[error("snippet added outside of any plug or slot context")]
    NoSecurityContext,

    /// A snippet was added for a tag the running hook does not own.
    #[error("snippet for {tag} added outside its context (current tags: {current:?})")]
    TagOutsideContext { tag: String, current: Vec<String> },

    #[error(transparent)]
    Snap(#[from] snap::Error),

    #[error(transparent)]
    Policy(#[from] policy::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
