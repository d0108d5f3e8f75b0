//! The capability contract every interface implements.

use crate::Result;
use crate::security::{apparmor, seccomp};
use snap::{ConnectedPlug, ConnectedSlot, PlugInfo, SlotInfo};
use thiserror::Error;

/// A declaration's attributes don't have the shape its interface needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<snap::Error> for ValidationError {
    fn from(err: snap::Error) -> Self {
        Self(err.to_string())
    }
}

/// Descriptive metadata and base declaration text of an interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticInfo {
    pub summary: &'static str,
    /// Rule text for the `plugs` section of the base declaration.
    pub base_declaration_plugs: &'static str,
    /// Rule text for the `slots` section of the base declaration.
    pub base_declaration_slots: &'static str,
}

/// A capability type that snaps plug into or provide as a slot.
///
/// Validation and `auto_connect` must be deterministic and free of side
/// effects. The security hooks default to contributing nothing; an
/// implementation only overrides the ones its backends need. A hook whose
/// preconditions don't hold must add nothing rather than something broader.
pub trait Interface: Send + Sync {
    /// Stable, globally unique name.
    fn name(&self) -> &str;

    fn static_info(&self) -> StaticInfo;

    /// Check a plug's attributes before the plug becomes usable.
    fn before_prepare_plug(&self, _plug: &PlugInfo) -> std::result::Result<(), ValidationError> {
        Ok(())
    }

    /// Check a slot's attributes before the slot becomes usable.
    fn before_prepare_slot(&self, _slot: &SlotInfo) -> std::result::Result<(), ValidationError> {
        Ok(())
    }

    /// The interface's own say on an auto-connection the base declaration
    /// already allows.
    fn auto_connect(&self, plug: &PlugInfo, slot: &SlotInfo) -> bool;

    fn apparmor_connected_plug(
        &self,
        _spec: &mut apparmor::Specification,
        _plug: &ConnectedPlug,
        _slot: &ConnectedSlot,
    ) -> Result<()> {
        Ok(())
    }

    fn apparmor_connected_slot(
        &self,
        _spec: &mut apparmor::Specification,
        _plug: &ConnectedPlug,
        _slot: &ConnectedSlot,
    ) -> Result<()> {
        Ok(())
    }

    fn apparmor_permanent_plug(
        &self,
        _spec: &mut apparmor::Specification,
        _plug: &PlugInfo,
    ) -> Result<()> {
        Ok(())
    }

    fn apparmor_permanent_slot(
        &self,
        _spec: &mut apparmor::Specification,
        _slot: &SlotInfo,
    ) -> Result<()> {
        Ok(())
    }

    fn seccomp_connected_plug(
        &self,
        _spec: &mut seccomp::Specification,
        _plug: &ConnectedPlug,
        _slot: &ConnectedSlot,
    ) -> Result<()> {
        Ok(())
    }

    fn seccomp_connected_slot(
        &self,
        _spec: &mut seccomp::Specification,
        _plug: &ConnectedPlug,
        _slot: &ConnectedSlot,
    ) -> Result<()> {
        Ok(())
    }

    fn seccomp_permanent_plug(
        &self,
        _spec: &mut seccomp::Specification,
        _plug: &PlugInfo,
    ) -> Result<()> {
        Ok(())
    }

    fn seccomp_permanent_slot(
        &self,
        _spec: &mut seccomp::Specification,
        _slot: &SlotInfo,
    ) -> Result<()> {
        Ok(())
    }
}

/// Run `before_prepare_plug`, attaching the plug's identity to any failure.
pub fn before_prepare_plug(iface: &dyn Interface, plug: &PlugInfo) -> Result<()> {
    iface
        .before_prepare_plug(plug)
        .map_err(|source| crate::Error::Validation {
            kind: "plug",
            reference: plug.reference().to_string(),
            interface: iface.name().to_string(),
            source,
        })
}

/// Run `before_prepare_slot`, attaching the slot's identity to any failure.
pub fn before_prepare_slot(iface: &dyn Interface, slot: &SlotInfo) -> Result<()> {
    iface
        .before_prepare_slot(slot)
        .map_err(|source| crate::Error::Validation {
            kind: "slot",
            reference: slot.reference().to_string(),
            interface: iface.name().to_string(),
            source,
        })
}
