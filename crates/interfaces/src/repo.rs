//! Installed snaps, their connections, and compile passes over them.

use crate::decision::{ConnectMode, ConnectionDecisionEngine};
use crate::interface::{before_prepare_plug, before_prepare_slot};
use crate::registry::Registry;
use crate::security::{SecurityBackend, Specification};
use crate::{Error, Result};
use policy::Verdict;
use snap::{ConnectedPlug, ConnectedSlot, Info, PlugInfo, PlugRef, SlotInfo, SlotRef};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identity of one connection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnRef {
    pub plug: PlugRef,
    pub slot: SlotRef,
}

impl ConnRef {
    pub fn new(plug: PlugRef, slot: SlotRef) -> Self {
        Self { plug, slot }
    }
}

impl fmt::Display for ConnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.plug, self.slot)
    }
}

/// An established connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub plug: ConnectedPlug,
    pub slot: ConnectedSlot,
    pub mode: ConnectMode,
}

impl Connection {
    pub fn interface(&self) -> &str {
        self.plug.interface()
    }
}

/// Engine state: installed snaps and the connections between them.
///
/// All iteration is in name order, so a compile pass over unchanged state
/// always produces the same output.
#[derive(Debug)]
pub struct Repository {
    registry: Arc<Registry>,
    snaps: BTreeMap<String, Info>,
    connections: BTreeMap<ConnRef, Connection>,
}

impl Repository {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            snaps: BTreeMap::new(),
            connections: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Install a snap.
    ///
    /// Declarations of unknown interfaces are dropped with a warning. Every
    /// remaining declaration must pass its interface's validation and the
    /// base declaration's installation rules, otherwise nothing is added.
    pub fn add_snap(&mut self, mut info: Info) -> Result<()> {
        let name = info.name().to_string();
        if self.snaps.contains_key(&name) {
            return Err(Error::SnapExists(name));
        }

        let registry = Arc::clone(&self.registry);
        for dropped in info.retain_interfaces(|iface| registry.contains(iface)) {
            warn!(snap = %name, "ignoring {dropped}");
        }

        let base = self.registry.base_declaration();
        for plug in info.plugs().values() {
            before_prepare_plug(self.registry.require(&plug.interface)?, plug)?;
            if let Verdict::Deny { reason } = base.check_plug_installation(plug) {
                return Err(Error::InstallationRefused {
                    snap: name,
                    reason: format!("plug {}: {reason}", plug.name),
                });
            }
        }
        for slot in info.slots().values() {
            before_prepare_slot(self.registry.require(&slot.interface)?, slot)?;
            if let Verdict::Deny { reason } = base.check_slot_installation(slot) {
                return Err(Error::InstallationRefused {
                    snap: name,
                    reason: format!("slot {}: {reason}", slot.name),
                });
            }
        }

        info!(
            snap = %name,
            plugs = info.plugs().len(),
            slots = info.slots().len(),
            "snap added"
        );
        self.snaps.insert(name, info);
        Ok(())
    }

    /// Remove a snap that has no connections left.
    pub fn remove_snap(&mut self, name: &str) -> Result<Info> {
        if !self.snaps.contains_key(name) {
            return Err(Error::UnknownSnap(name.to_string()));
        }
        if self
            .connections
            .keys()
            .any(|conn| conn.plug.snap == name || conn.slot.snap == name)
        {
            return Err(Error::SnapInUse(name.to_string()));
        }
        info!(snap = %name, "snap removed");
        self.snaps
            .remove(name)
            .ok_or_else(|| Error::UnknownSnap(name.to_string()))
    }

    pub fn snap(&self, name: &str) -> Option<&Info> {
        self.snaps.get(name)
    }

    pub fn snaps(&self) -> impl Iterator<Item = &Info> {
        self.snaps.values()
    }

    pub fn plug(&self, plug: &PlugRef) -> Result<&Arc<PlugInfo>> {
        self.snaps
            .get(&plug.snap)
            .and_then(|info| info.plug(&plug.name))
            .ok_or_else(|| Error::UnknownPlug(plug.clone()))
    }

    pub fn slot(&self, slot: &SlotRef) -> Result<&Arc<SlotInfo>> {
        self.snaps
            .get(&slot.snap)
            .and_then(|info| info.slot(&slot.name))
            .ok_or_else(|| Error::UnknownSlot(slot.clone()))
    }

    /// Connect a plug to a slot if the decision engine approves.
    ///
    /// Reconnecting an existing pair is a no-op. A plug is connected to at
    /// most one slot; a slot may serve many plugs.
    pub fn connect(
        &mut self,
        plug: &PlugRef,
        slot: &SlotRef,
        mode: ConnectMode,
    ) -> Result<ConnRef> {
        let plug_info = Arc::clone(self.plug(plug)?);
        let slot_info = Arc::clone(self.slot(slot)?);

        let conn = ConnRef::new(plug.clone(), slot.clone());
        if self.connections.contains_key(&conn) {
            debug!(%conn, "already connected");
            return Ok(conn);
        }
        if let Some(existing) = self.connections.keys().find(|c| &c.plug == plug) {
            return Err(Error::PlugAlreadyConnected {
                plug: plug.clone(),
                slot: existing.slot.clone(),
            });
        }

        ConnectionDecisionEngine::new(&self.registry).check(&plug_info, &slot_info, mode)?;

        info!(%conn, %mode, interface = %plug_info.interface, "connected");
        self.connections.insert(
            conn.clone(),
            Connection {
                plug: ConnectedPlug::new(plug_info),
                slot: ConnectedSlot::new(slot_info),
                mode,
            },
        );
        Ok(conn)
    }

    pub fn disconnect(&mut self, plug: &PlugRef, slot: &SlotRef) -> Result<Connection> {
        let conn = ConnRef::new(plug.clone(), slot.clone());
        let removed = self
            .connections
            .remove(&conn)
            .ok_or_else(|| Error::NotConnected {
                plug: plug.clone(),
                slot: slot.clone(),
            })?;
        info!(%conn, "disconnected");
        Ok(removed)
    }

    /// Auto-connect the unconnected plugs and slots of `snap`.
    ///
    /// A plug is only connected when exactly one slot is approved for it;
    /// ambiguous plugs are left alone.
    pub fn auto_connect(&mut self, snap: &str) -> Result<Vec<ConnRef>> {
        let info = self
            .snaps
            .get(snap)
            .ok_or_else(|| Error::UnknownSnap(snap.to_string()))?;

        let engine = ConnectionDecisionEngine::new(&self.registry);
        let mut planned = Vec::new();
        for plug in self.unconnected_plugs() {
            let touches_snap = plug.snap == snap
                || info
                    .slots()
                    .values()
                    .any(|slot| slot.interface == plug.interface);
            if !touches_snap {
                continue;
            }
            let candidates: Vec<&Arc<SlotInfo>> = self
                .snaps
                .values()
                .flat_map(|other| other.slots().values())
                .filter(|slot| slot.interface == plug.interface)
                .filter(|slot| engine.decide(plug, slot, ConnectMode::Auto).is_approved())
                .collect();
            match candidates.as_slice() {
                [slot] if plug.snap == snap || slot.snap == snap => {
                    planned.push((plug.reference(), slot.reference()));
                }
                [_] => {}
                [] => {}
                many => debug!(
                    plug = %plug.reference(),
                    candidates = many.len(),
                    "ambiguous auto-connection, skipping"
                ),
            }
        }

        let mut connected = Vec::with_capacity(planned.len());
        for (plug, slot) in planned {
            connected.push(self.connect(&plug, &slot, ConnectMode::Auto)?);
        }
        Ok(connected)
    }

    fn unconnected_plugs(&self) -> impl Iterator<Item = &Arc<PlugInfo>> {
        self.snaps
            .values()
            .flat_map(|info| info.plugs().values())
            .filter(|plug| {
                let plug_ref = plug.reference();
                !self.connections.keys().any(|conn| conn.plug == plug_ref)
            })
    }

    /// Every connection, in plug then slot order.
    pub fn connections(&self) -> impl Iterator<Item = (&ConnRef, &Connection)> {
        self.connections.iter()
    }

    pub fn plug_connections(&self, plug: &PlugRef) -> Vec<&ConnRef> {
        self.connections
            .keys()
            .filter(|conn| &conn.plug == plug)
            .collect()
    }

    pub fn slot_connections(&self, slot: &SlotRef) -> Vec<&ConnRef> {
        self.connections
            .keys()
            .filter(|conn| &conn.slot == slot)
            .collect()
    }

    /// Run one compile pass for backend `B` over every snap.
    ///
    /// Permanent hooks run once per declaration, then connected hooks once
    /// per connection for both ends.
    pub fn specification<B: SecurityBackend>(&self) -> Result<Specification<B>> {
        self.compile(|_| true)
    }

    /// Run one compile pass for backend `B` covering only the apps and hooks
    /// of `snap`.
    pub fn snap_specification<B: SecurityBackend>(&self, snap: &str) -> Result<Specification<B>> {
        if !self.snaps.contains_key(snap) {
            return Err(Error::UnknownSnap(snap.to_string()));
        }
        self.compile(|owner| owner == snap)
    }

    fn compile<B: SecurityBackend>(
        &self,
        owned: impl Fn(&str) -> bool,
    ) -> Result<Specification<B>> {
        let mut spec = Specification::<B>::new();
        for info in self.snaps.values().filter(|info| owned(info.name())) {
            for plug in info.plugs().values() {
                spec.add_permanent_plug(self.registry.require(&plug.interface)?, plug)?;
            }
            for slot in info.slots().values() {
                spec.add_permanent_slot(self.registry.require(&slot.interface)?, slot)?;
            }
        }
        for conn in self.connections.values() {
            let iface = self.registry.require(conn.interface())?;
            if owned(conn.plug.snap()) {
                spec.add_connected_plug(iface, &conn.plug, &conn.slot)?;
            }
            if owned(conn.slot.snap()) {
                spec.add_connected_slot(iface, &conn.plug, &conn.slot)?;
            }
        }
        debug!(
            backend = B::NAME,
            tags = spec.security_tags().len(),
            "compile pass finished"
        );
        Ok(spec)
    }
}
