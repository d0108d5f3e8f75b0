//! AppArmor profile snippets.

use super::SecurityBackend;
use crate::Result;
use crate::interface::Interface;
use snap::{ConnectedPlug, ConnectedSlot, PlugInfo, SlotInfo};

/// Marker for the AppArmor backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppArmor;

pub type Specification = super::Specification<AppArmor>;

impl SecurityBackend for AppArmor {
    const NAME: &'static str = "apparmor";

    fn connected_plug(
        iface: &dyn Interface,
        spec: &mut Specification,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()> {
        iface.apparmor_connected_plug(spec, plug, slot)
    }

    fn connected_slot(
        iface: &dyn Interface,
        spec: &mut Specification,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()> {
        iface.apparmor_connected_slot(spec, plug, slot)
    }

    fn permanent_plug(
        iface: &dyn Interface,
        spec: &mut Specification,
        plug: &PlugInfo,
    ) -> Result<()> {
        iface.apparmor_permanent_plug(spec, plug)
    }

    fn permanent_slot(
        iface: &dyn Interface,
        spec: &mut Specification,
        slot: &SlotInfo,
    ) -> Result<()> {
        iface.apparmor_permanent_slot(spec, slot)
    }
}
