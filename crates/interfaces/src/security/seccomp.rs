//! Seccomp filter snippets (one syscall per line).

use super::SecurityBackend;
use crate::Result;
use crate::interface::Interface;
use snap::{ConnectedPlug, ConnectedSlot, PlugInfo, SlotInfo};

/// Marker for the Seccomp backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Seccomp;

pub type Specification = super::Specification<Seccomp>;

impl SecurityBackend for Seccomp {
    const NAME: &'static str = "seccomp";

    fn connected_plug(
        iface: &dyn Interface,
        spec: &mut Specification,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()> {
        iface.seccomp_connected_plug(spec, plug, slot)
    }

    fn connected_slot(
        iface: &dyn Interface,
        spec: &mut Specification,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()> {
        iface.seccomp_connected_slot(spec, plug, slot)
    }

    fn permanent_plug(
        iface: &dyn Interface,
        spec: &mut Specification,
        plug: &PlugInfo,
    ) -> Result<()> {
        iface.seccomp_permanent_plug(spec, plug)
    }

    fn permanent_slot(
        iface: &dyn Interface,
        spec: &mut Specification,
        slot: &SlotInfo,
    ) -> Result<()> {
        iface.seccomp_permanent_slot(spec, slot)
    }
}
