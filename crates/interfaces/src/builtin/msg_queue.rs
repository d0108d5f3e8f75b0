//! POSIX message queues shared by name.
//!
//! The slot side owns a queue name (possibly an AppArmor glob such as
//! `/sp*-cl*-*`) and the plug side names the queue it wants to use. Manual
//! connections are refused by the base declaration; auto-connection only
//! happens when both sides declare the same name.

use crate::Result;
use crate::interface::{Interface, StaticInfo, ValidationError};
use crate::security::{apparmor, seccomp};
use snap::{Attrer, ConnectedPlug, ConnectedSlot, PlugInfo, SlotInfo};
use tracing::debug;

const SUMMARY: &str = "allows POSIX message queues with a specific name";

const BASE_DECLARATION_SLOTS: &str = r#"
  msg-queue:
    allow-installation:
      slot-snap-type:
        - app
        - gadget
    deny-connection:
      slot-attributes:
        name: .+
    allow-auto-connection:
      plug-attributes:
        name: $SLOT(name)
"#;

const SECCOMP_SNIPPET: &str = "\
# Description: create, open, send to and receive from a named POSIX message queue
mq_getsetattr
mq_notify
mq_open
mq_timedreceive
mq_timedreceive_time64
mq_timedsend
mq_timedsend_time64
mq_unlink
";

#[derive(Debug, Clone, Copy, Default)]
pub struct MsgQueueInterface;

impl MsgQueueInterface {
    pub const NAME: &'static str = "msg-queue";

    fn queue_name(attrs: &dyn Attrer) -> std::result::Result<&str, ValidationError> {
        let name = attrs.str_attr("name")?;
        if !name.starts_with('/') {
            return Err(ValidationError::new("msg queue name should start with /"));
        }
        if name.len() < 2 {
            return Err(ValidationError::new(format!(
                "invalid length for msg queue name {name:?}"
            )));
        }
        Ok(name)
    }
}

impl Interface for MsgQueueInterface {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo {
            summary: SUMMARY,
            base_declaration_plugs: "",
            base_declaration_slots: BASE_DECLARATION_SLOTS,
        }
    }

    fn before_prepare_plug(&self, plug: &PlugInfo) -> std::result::Result<(), ValidationError> {
        Self::queue_name(plug).map(|_| ())
    }

    fn before_prepare_slot(&self, slot: &SlotInfo) -> std::result::Result<(), ValidationError> {
        Self::queue_name(slot).map(|_| ())
    }

    /// The base declaration already requires equal names.
    fn auto_connect(&self, _plug: &PlugInfo, _slot: &SlotInfo) -> bool {
        true
    }

    fn apparmor_connected_plug(
        &self,
        spec: &mut apparmor::Specification,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()> {
        let name = plug.str_attr("name")?;
        let slot_name = slot.str_attr("name")?;
        if name != slot_name {
            debug!(
                plug = %plug.reference(),
                slot = %slot.reference(),
                "queue names differ, no rule added"
            );
            return Ok(());
        }
        spec.add_snippet(format!("{name} rw,\n"))
    }

    fn apparmor_permanent_slot(
        &self,
        spec: &mut apparmor::Specification,
        slot: &SlotInfo,
    ) -> Result<()> {
        let name = slot.str_attr("name")?;
        spec.add_snippet(format!("{name} rw,\n"))
    }

    fn seccomp_connected_plug(
        &self,
        spec: &mut seccomp::Specification,
        _plug: &ConnectedPlug,
        _slot: &ConnectedSlot,
    ) -> Result<()> {
        spec.add_snippet(SECCOMP_SNIPPET)
    }

    fn seccomp_permanent_slot(
        &self,
        spec: &mut seccomp::Specification,
        _slot: &SlotInfo,
    ) -> Result<()> {
        spec.add_snippet(SECCOMP_SNIPPET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::{before_prepare_plug, before_prepare_slot};
    use snap::{AttrValue, AttributeSet, Info};
    use std::sync::Arc;

    const SYSCALLS: &str = "mq_getsetattr\nmq_notify\nmq_open\nmq_timedreceive\nmq_timedreceive_time64\nmq_timedsend\nmq_timedsend_time64\nmq_unlink\n";

    const SNAP_YAML: &str = r#"
name: test-msgq
version: 0
slots:
  test-msgq-slot:
    interface: msg-queue
    name: /sp-server
  test-msgq-regex-slot:
    interface: msg-queue
    name: /sp*-cl*-*
plugs:
  test-msgq-plug:
    interface: msg-queue
    name: /sp-server
  test-msgq-regex-plug:
    interface: msg-queue
    name: /sp*-cl*-*
apps:
  test-msgq-provider:
    slots:
      - test-msgq-slot
      - test-msgq-regex-slot
  test-msgq-consumer:
    plugs:
      - test-msgq-plug
      - test-msgq-regex-plug
"#;

    const PROVIDER: &str = "snap.test-msgq.test-msgq-provider";
    const CONSUMER: &str = "snap.test-msgq.test-msgq-consumer";

    fn info() -> Info {
        Info::from_yaml(SNAP_YAML).unwrap()
    }

    fn connected(info: &Info, plug: &str, slot: &str) -> (ConnectedPlug, ConnectedSlot) {
        (
            ConnectedPlug::new(Arc::clone(info.plug(plug).unwrap())),
            ConnectedSlot::new(Arc::clone(info.slot(slot).unwrap())),
        )
    }

    fn slot_named(name: AttrValue) -> SlotInfo {
        SlotInfo::new(
            "msgq-snap",
            "msgq-slot",
            "msg-queue",
            AttributeSet::from_pairs([("name", name)]).unwrap(),
        )
    }

    fn plug_named(name: AttrValue) -> PlugInfo {
        PlugInfo::new(
            "msgq-snap",
            "msgq-plug",
            "msg-queue",
            AttributeSet::from_pairs([("name", name)]).unwrap(),
        )
    }

    #[test]
    fn test_name() {
        assert_eq!(MsgQueueInterface.name(), "msg-queue");
    }

    #[test]
    fn test_sanitize_queue_names() {
        let iface = MsgQueueInterface;
        let plug = PlugInfo::new(
            "msgq-snap",
            "msgq-plug",
            "msg-queue",
            AttributeSet::from_pairs([("name", "/sp-client")]).unwrap(),
        );
        assert!(before_prepare_plug(&iface, &plug).is_ok());
        assert!(before_prepare_slot(&iface, &slot_named("/sp-client".into())).is_ok());
        assert!(before_prepare_slot(&iface, &slot_named("/q".into())).is_ok());
    }

    #[test]
    fn test_sanitize_rejects_bad_names() {
        let iface = MsgQueueInterface;
        for bad in ["/", "sp-client", ""] {
            let err = before_prepare_slot(&iface, &slot_named(bad.into())).unwrap_err();
            assert!(matches!(err, crate::Error::Validation { kind: "slot", .. }), "{bad:?}");
        }
        assert!(before_prepare_slot(&iface, &slot_named(AttrValue::Int(3))).is_err());

        let missing = SlotInfo::new("msgq-snap", "msgq-slot", "msg-queue", AttributeSet::empty());
        let err = before_prepare_slot(&iface, &missing).unwrap_err();
        assert!(err.to_string().contains("msgq-snap:msgq-slot"));

        for bad in ["/", "q", ""] {
            let err = before_prepare_plug(&iface, &plug_named(bad.into())).unwrap_err();
            assert!(matches!(err, crate::Error::Validation { kind: "plug", .. }), "{bad:?}");
        }
        assert!(before_prepare_plug(&iface, &plug_named(AttrValue::Int(3))).is_err());

        let missing = PlugInfo::new("msgq-snap", "msgq-plug", "msg-queue", AttributeSet::empty());
        let err = before_prepare_plug(&iface, &missing).unwrap_err();
        assert!(err.to_string().contains("msgq-snap:msgq-plug"));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let iface = MsgQueueInterface;
        let slot = slot_named("nope".into());
        let first = iface.before_prepare_slot(&slot);
        let second = iface.before_prepare_slot(&slot);
        assert_eq!(first, second);
    }

    #[test]
    fn test_permanent_slot_seccomp() {
        let info = info();
        let mut spec = seccomp::Specification::new();
        spec.add_permanent_slot(&MsgQueueInterface, info.slot("test-msgq-slot").unwrap()).unwrap();
        assert_eq!(spec.security_tags(), vec![PROVIDER]);
        assert!(spec.snippet_for_tag(PROVIDER).contains(SYSCALLS));
    }

    #[test]
    fn test_connected_plug_seccomp() {
        let info = info();
        let (plug, slot) = connected(&info, "test-msgq-plug", "test-msgq-slot");
        let mut spec = seccomp::Specification::new();
        spec.add_connected_plug(&MsgQueueInterface, &plug, &slot).unwrap();
        assert_eq!(spec.security_tags(), vec![CONSUMER]);
        assert!(spec.snippet_for_tag(CONSUMER).contains(SYSCALLS));
    }

    #[test]
    fn test_permanent_slot_apparmor() {
        let info = info();
        let mut spec = apparmor::Specification::new();
        spec.add_permanent_slot(&MsgQueueInterface, info.slot("test-msgq-slot").unwrap()).unwrap();
        assert_eq!(spec.security_tags(), vec![PROVIDER]);
        assert_eq!(spec.snippet_for_tag(PROVIDER), "/sp-server rw,\n");
    }

    #[test]
    fn test_connected_plug_apparmor() {
        let info = info();
        let (plug, slot) = connected(&info, "test-msgq-plug", "test-msgq-slot");
        let mut spec = apparmor::Specification::new();
        spec.add_connected_plug(&MsgQueueInterface, &plug, &slot).unwrap();
        assert_eq!(spec.security_tags(), vec![CONSUMER]);
        assert_eq!(spec.snippet_for_tag(CONSUMER), "/sp-server rw,\n");
    }

    #[test]
    fn test_glob_queue_names_pass_through() {
        let info = info();
        let mut spec = apparmor::Specification::new();
        spec.add_permanent_slot(
            &MsgQueueInterface,
            info.slot("test-msgq-regex-slot").unwrap(),
        )
        .unwrap();
        assert_eq!(spec.snippet_for_tag(PROVIDER), "/sp*-cl*-* rw,\n");

        let (plug, slot) = connected(&info, "test-msgq-regex-plug", "test-msgq-regex-slot");
        spec.add_connected_plug(&MsgQueueInterface, &plug, &slot).unwrap();
        assert_eq!(spec.snippet_for_tag(CONSUMER), "/sp*-cl*-* rw,\n");
    }

    #[test]
    fn test_connected_plug_apparmor_mismatched_names() {
        let info = info();
        let (plug, slot) = connected(&info, "test-msgq-regex-plug", "test-msgq-slot");
        let mut spec = apparmor::Specification::new();
        spec.add_connected_plug(&MsgQueueInterface, &plug, &slot).unwrap();
        assert!(spec.security_tags().is_empty());
    }

    #[test]
    fn test_connected_plug_apparmor_missing_name_fails() {
        let info = info();
        let plug = ConnectedPlug::new(Arc::new(PlugInfo {
            apps: ["test-msgq-consumer".to_string()].into(),
            ..PlugInfo::new("test-msgq", "bare", "msg-queue", AttributeSet::empty())
        }));
        let slot = ConnectedSlot::new(Arc::clone(info.slot("test-msgq-slot").unwrap()));
        let mut spec = apparmor::Specification::new();
        let err = spec
            .add_connected_plug(&MsgQueueInterface, &plug, &slot)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Snap(snap::Error::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_static_info() {
        let info = MsgQueueInterface.static_info();
        assert!(info.base_declaration_slots.contains("msg-queue"));
        assert!(info.base_declaration_plugs.is_empty());
        assert!(!info.summary.is_empty());
    }

    #[test]
    fn test_auto_connect() {
        let info = info();
        let iface = MsgQueueInterface;
        assert!(iface.auto_connect(
            info.plug("test-msgq-plug").unwrap(),
            info.slot("test-msgq-slot").unwrap()
        ));
        assert!(iface.auto_connect(
            info.plug("test-msgq-regex-plug").unwrap(),
            info.slot("test-msgq-regex-slot").unwrap()
        ));
    }
}
