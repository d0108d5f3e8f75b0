//! The base declaration and its verdicts.

use crate::rule::{RuleSet, SideVerdict, Subject};
use crate::scope::{Scope, Side};
use crate::{Error, Result};
use serde::Serialize;
use snap::{PlugInfo, SlotInfo};
use std::collections::BTreeMap;
use tracing::debug;

/// Result of evaluating the base declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny { reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Default allow/deny rules for every known interface.
///
/// Built once when the interface registry is built and read-only after.
#[derive(Debug, Clone, Default)]
pub struct BaseDeclaration {
    plugs: BTreeMap<String, RuleSet>,
    slots: BTreeMap<String, RuleSet>,
}

impl BaseDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and add the plug-side and slot-side rule text of an interface.
    pub fn add_interface(&mut self, interface: &str, plugs: &str, slots: &str) -> Result<()> {
        if self.plugs.contains_key(interface) {
            return Err(Error::Duplicate(interface.to_string()));
        }
        let plug_rules = RuleSet::parse(interface, Side::Plug, plugs)?;
        let slot_rules = RuleSet::parse(interface, Side::Slot, slots)?;
        self.plugs.insert(interface.to_string(), plug_rules);
        self.slots.insert(interface.to_string(), slot_rules);
        Ok(())
    }

    pub fn plug_rules(&self, interface: &str) -> Option<&RuleSet> {
        self.plugs.get(interface)
    }

    pub fn slot_rules(&self, interface: &str) -> Option<&RuleSet> {
        self.slots.get(interface)
    }

    /// May a snap declaring `plug` be installed?
    pub fn check_plug_installation(&self, plug: &PlugInfo) -> Verdict {
        let verdict = side_verdict(
            self.plug_rules(&plug.interface),
            Scope::Installation,
            &Subject::InstallPlug(plug),
        );
        let verdict = combine(Scope::Installation, verdict, SideVerdict::Abstain);
        debug!(
            plug = %plug.reference(),
            interface = %plug.interface,
            ?verdict,
            "installation check"
        );
        verdict
    }

    /// May a snap declaring `slot` be installed?
    pub fn check_slot_installation(&self, slot: &SlotInfo) -> Verdict {
        let verdict = side_verdict(
            self.slot_rules(&slot.interface),
            Scope::Installation,
            &Subject::InstallSlot(slot),
        );
        let verdict = combine(Scope::Installation, SideVerdict::Abstain, verdict);
        debug!(
            slot = %slot.reference(),
            interface = %slot.interface,
            ?verdict,
            "installation check"
        );
        verdict
    }

    /// May `plug` be manually connected to `slot`?
    pub fn check_connection(&self, plug: &PlugInfo, slot: &SlotInfo) -> Verdict {
        self.check_pair(Scope::Connection, plug, slot)
    }

    /// May `plug` be automatically connected to `slot`?
    ///
    /// An allow here is still subject to the interface's own veto.
    pub fn check_auto_connection(&self, plug: &PlugInfo, slot: &SlotInfo) -> Verdict {
        self.check_pair(Scope::AutoConnection, plug, slot)
    }

    fn check_pair(&self, scope: Scope, plug: &PlugInfo, slot: &SlotInfo) -> Verdict {
        let subject = Subject::Connect { plug, slot };
        let plug_side = side_verdict(self.plug_rules(&plug.interface), scope, &subject);
        let slot_side = side_verdict(self.slot_rules(&slot.interface), scope, &subject);
        let verdict = combine(scope, plug_side, slot_side);
        debug!(
            plug = %plug.reference(),
            slot = %slot.reference(),
            %scope,
            ?verdict,
            "connection check"
        );
        verdict
    }
}

fn side_verdict(rules: Option<&RuleSet>, scope: Scope, subject: &Subject<'_>) -> SideVerdict {
    rules.map_or(SideVerdict::Abstain, |rules| rules.evaluate(scope, subject))
}

/// Combine the two sides: either side denying vetoes, otherwise any side
/// allowing grants, and when neither side has rules the scope default holds.
fn combine(scope: Scope, plug: SideVerdict, slot: SideVerdict) -> Verdict {
    match (plug, slot) {
        (SideVerdict::Deny(reason), _) | (_, SideVerdict::Deny(reason)) => {
            Verdict::Deny { reason }
        }
        (SideVerdict::Allow, _) | (_, SideVerdict::Allow) => Verdict::Allow,
        (SideVerdict::Abstain, SideVerdict::Abstain) if scope.allowed_by_default() => {
            Verdict::Allow
        }
        (SideVerdict::Abstain, SideVerdict::Abstain) => Verdict::Deny {
            reason: format!("no rule allows {scope}"),
        },
    }
}
