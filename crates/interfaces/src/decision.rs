//! Final connect/no-connect decisions for plug/slot pairs.

use crate::registry::Registry;
use crate::{Error, Result};
use policy::Verdict;
use snap::{PlugInfo, SlotInfo};
use std::fmt;
use tracing::{debug, info};

/// How a connection was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectMode {
    /// The system is pairing a newly installed snap on its own.
    Auto,
    /// A user or administrator asked for this connection.
    Manual,
}

impl fmt::Display for ConnectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectMode::Auto => "auto",
            ConnectMode::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied { reason: String },
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved)
    }

    /// Turn a denial into [`Error::ConnectionRefused`].
    pub fn into_result(self, plug: &PlugInfo, slot: &SlotInfo) -> Result<()> {
        match self {
            Decision::Approved => Ok(()),
            Decision::Denied { reason } => Err(Error::ConnectionRefused {
                plug: plug.reference(),
                slot: slot.reference(),
                reason,
            }),
        }
    }
}

/// Combines the base declaration with each interface's own veto.
///
/// Deciding reads only the registry and its arguments, so the same pair
/// always gets the same decision.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionDecisionEngine<'r> {
    registry: &'r Registry,
}

impl<'r> ConnectionDecisionEngine<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn decide(&self, plug: &PlugInfo, slot: &SlotInfo, mode: ConnectMode) -> Decision {
        let decision = self.evaluate(plug, slot, mode);
        match &decision {
            Decision::Approved => info!(
                plug = %plug.reference(),
                slot = %slot.reference(),
                %mode,
                "connection approved"
            ),
            Decision::Denied { reason } => debug!(
                plug = %plug.reference(),
                slot = %slot.reference(),
                %mode,
                %reason,
                "connection denied"
            ),
        }
        decision
    }

    /// [`ConnectionDecisionEngine::decide`], with a denial as an error.
    pub fn check(&self, plug: &PlugInfo, slot: &SlotInfo, mode: ConnectMode) -> Result<()> {
        self.decide(plug, slot, mode).into_result(plug, slot)
    }

    fn evaluate(&self, plug: &PlugInfo, slot: &SlotInfo, mode: ConnectMode) -> Decision {
        if plug.interface != slot.interface {
            return Decision::Denied {
                reason: format!(
                    "plug interface {:?} does not match slot interface {:?}",
                    plug.interface, slot.interface
                ),
            };
        }
        let Some(iface) = self.registry.get(&plug.interface) else {
            return Decision::Denied {
                reason: format!("unknown interface {:?}", plug.interface),
            };
        };

        let base = self.registry.base_declaration();
        let verdict = match mode {
            ConnectMode::Manual => base.check_connection(plug, slot),
            ConnectMode::Auto => base.check_auto_connection(plug, slot),
        };
        match verdict {
            Verdict::Deny { reason } => Decision::Denied { reason },
            Verdict::Allow if mode == ConnectMode::Auto && !iface.auto_connect(plug, slot) => {
                Decision::Denied {
                    reason: format!("interface {} declined auto-connection", iface.name()),
                }
            }
            Verdict::Allow => Decision::Approved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{Interface, StaticInfo};
    use snap::AttributeSet;

    /// Allowed everywhere by its rules, but never auto-connects.
    struct Shy;

    impl Interface for Shy {
        fn name(&self) -> &str {
            "shy"
        }

        fn static_info(&self) -> StaticInfo {
            StaticInfo {
                base_declaration_plugs: "shy:\n  allow-auto-connection: true\n",
                ..StaticInfo::default()
            }
        }

        fn auto_connect(&self, _plug: &PlugInfo, _slot: &SlotInfo) -> bool {
            false
        }
    }

    fn registry() -> Registry {
        let mut interfaces = crate::builtin::interfaces();
        interfaces.push(Box::new(Shy));
        Registry::new(interfaces).unwrap()
    }

    fn pair(iface: &str, plug_name: &str, slot_name: &str) -> (PlugInfo, SlotInfo) {
        (
            PlugInfo::new(
                "consumer",
                "p",
                iface,
                AttributeSet::from_pairs([("name", plug_name)]).unwrap(),
            ),
            SlotInfo::new(
                "provider",
                "s",
                iface,
                AttributeSet::from_pairs([("name", slot_name)]).unwrap(),
            ),
        )
    }

    #[test]
    fn test_msg_queue_decisions() {
        let registry = registry();
        let engine = ConnectionDecisionEngine::new(&registry);

        let (plug, slot) = pair("msg-queue", "/sp-server", "/sp-server");
        assert!(engine.decide(&plug, &slot, ConnectMode::Auto).is_approved());
        assert!(!engine.decide(&plug, &slot, ConnectMode::Manual).is_approved());

        let (plug, slot) = pair("msg-queue", "/sp-client", "/sp-server");
        assert!(!engine.decide(&plug, &slot, ConnectMode::Auto).is_approved());
    }

    #[test]
    fn test_interface_veto_applies_only_to_auto() {
        let registry = registry();
        let engine = ConnectionDecisionEngine::new(&registry);
        let (plug, slot) = pair("shy", "/a", "/a");

        match engine.decide(&plug, &slot, ConnectMode::Auto) {
            Decision::Denied { reason } => assert!(reason.contains("declined")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(engine.check(&plug, &slot, ConnectMode::Manual).is_ok());
    }

    #[test]
    fn test_mismatched_and_unknown_interfaces_denied() {
        let registry = registry();
        let engine = ConnectionDecisionEngine::new(&registry);

        let (plug, _) = pair("shy", "/a", "/a");
        let (_, slot) = pair("msg-queue", "/a", "/a");
        assert!(!engine.decide(&plug, &slot, ConnectMode::Manual).is_approved());

        let (plug, slot) = pair("nope", "/a", "/a");
        let err = engine.check(&plug, &slot, ConnectMode::Manual).unwrap_err();
        assert!(matches!(err, Error::ConnectionRefused { .. }));
        assert!(err.to_string().contains("consumer:p"));
    }

    #[test]
    fn test_decide_is_deterministic() {
        let registry = registry();
        let engine = ConnectionDecisionEngine::new(&registry);
        let (plug, slot) = pair("msg-queue", "/x", "/y");
        let first = engine.decide(&plug, &slot, ConnectMode::Auto);
        assert_eq!(first, engine.decide(&plug, &slot, ConnectMode::Auto));
    }
}
