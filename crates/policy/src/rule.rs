//! Parsed base declaration rules for one side of one interface.

use crate::constraint::{AttrConstraints, parse_error};
use crate::scope::{Action, Scope, Side};
use crate::{Error, Result};
use serde_yaml::{Mapping, Value};
use snap::{Attrer, PlugInfo, SlotInfo, SnapType};

/// What a rule is being evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// Installing a snap that declares this plug.
    InstallPlug(&'a PlugInfo),
    /// Installing a snap that declares this slot.
    InstallSlot(&'a SlotInfo),
    /// Connecting this plug to this slot.
    Connect {
        plug: &'a PlugInfo,
        slot: &'a SlotInfo,
    },
}

impl<'a> Subject<'a> {
    pub fn plug(&self) -> Option<&'a PlugInfo> {
        match *self {
            Subject::InstallPlug(plug) | Subject::Connect { plug, .. } => Some(plug),
            Subject::InstallSlot(_) => None,
        }
    }

    pub fn slot(&self) -> Option<&'a SlotInfo> {
        match *self {
            Subject::InstallSlot(slot) | Subject::Connect { slot, .. } => Some(slot),
            Subject::InstallPlug(_) => None,
        }
    }
}

/// One alternative of a rule: every present constraint must hold.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    pub plug_attributes: Option<AttrConstraints>,
    pub slot_attributes: Option<AttrConstraints>,
    pub plug_snap_types: Option<Vec<SnapType>>,
    pub slot_snap_types: Option<Vec<SnapType>>,
    pub plug_names: Option<Vec<String>>,
    pub slot_names: Option<Vec<String>>,
}

impl ConstraintSet {
    /// Check the subject, returning the first unmet constraint.
    pub fn check(&self, subject: &Subject<'_>) -> std::result::Result<(), String> {
        let plug = subject.plug();
        let slot = subject.slot();

        if self.has_plug_constraints() && plug.is_none() {
            return Err("plug constraints need a plug".to_string());
        }
        if self.has_slot_constraints() && slot.is_none() {
            return Err("slot constraints need a slot".to_string());
        }

        if let Some(plug) = plug {
            check_snap_type(Side::Plug, self.plug_snap_types.as_deref(), plug.snap_type)?;
            check_names(Side::Plug, self.plug_names.as_deref(), &plug.name)?;
            if let Some(constraints) = &self.plug_attributes {
                constraints
                    .check(plug, slot.map(|s| s as &dyn Attrer))
                    .map_err(|e| format!("plug {e}"))?;
            }
        }
        if let Some(slot) = slot {
            check_snap_type(Side::Slot, self.slot_snap_types.as_deref(), slot.snap_type)?;
            check_names(Side::Slot, self.slot_names.as_deref(), &slot.name)?;
            if let Some(constraints) = &self.slot_attributes {
                constraints
                    .check(slot, plug.map(|p| p as &dyn Attrer))
                    .map_err(|e| format!("slot {e}"))?;
            }
        }
        Ok(())
    }

    fn has_plug_constraints(&self) -> bool {
        self.plug_attributes.is_some()
            || self.plug_snap_types.is_some()
            || self.plug_names.is_some()
    }

    fn has_slot_constraints(&self) -> bool {
        self.slot_attributes.is_some()
            || self.slot_snap_types.is_some()
            || self.slot_names.is_some()
    }

    fn parse(interface: &str, side: Side, scope: Scope, mapping: &Mapping) -> Result<Self> {
        let mut set = ConstraintSet::default();
        for (key, value) in mapping {
            let Value::String(key) = key else {
                return Err(parse_error(interface, "constraint keys must be strings"));
            };
            let (constrained, kind) = match key.split_once('-') {
                Some(("plug", kind)) => (Side::Plug, kind),
                Some(("slot", kind)) => (Side::Slot, kind),
                _ => return Err(parse_error(interface, format!("unknown constraint {key:?}"))),
            };
            if scope == Scope::Installation && constrained != side {
                return Err(parse_error(
                    interface,
                    format!("{key} cannot constrain {side} installation"),
                ));
            }
            match (constrained, kind) {
                (Side::Plug, "attributes") => {
                    set.plug_attributes =
                        Some(AttrConstraints::parse(interface, Side::Plug, value)?)
                }
                (Side::Slot, "attributes") => {
                    set.slot_attributes =
                        Some(AttrConstraints::parse(interface, Side::Slot, value)?)
                }
                (Side::Plug, "snap-type") => {
                    set.plug_snap_types = Some(snap_types(interface, value)?)
                }
                (Side::Slot, "snap-type") => {
                    set.slot_snap_types = Some(snap_types(interface, value)?)
                }
                (Side::Plug, "names") => set.plug_names = Some(strings(interface, key, value)?),
                (Side::Slot, "names") => set.slot_names = Some(strings(interface, key, value)?),
                _ => return Err(parse_error(interface, format!("unknown constraint {key:?}"))),
            }
        }
        if scope == Scope::Installation {
            let refs = [&set.plug_attributes, &set.slot_attributes]
                .into_iter()
                .flatten()
                .any(AttrConstraints::has_references);
            if refs {
                return Err(parse_error(
                    interface,
                    "installation rules cannot refer to a counterpart",
                ));
            }
        }
        Ok(set)
    }
}

fn check_snap_type(
    side: Side,
    allowed: Option<&[SnapType]>,
    actual: SnapType,
) -> std::result::Result<(), String> {
    match allowed {
        Some(allowed) if !allowed.contains(&actual) => {
            Err(format!("{side} snap type {actual} is not one of {allowed:?}"))
        }
        _ => Ok(()),
    }
}

fn check_names(
    side: Side,
    allowed: Option<&[String]>,
    actual: &str,
) -> std::result::Result<(), String> {
    match allowed {
        Some(allowed) if !allowed.iter().any(|n| n == actual) => {
            Err(format!("{side} name {actual:?} is not one of {allowed:?}"))
        }
        _ => Ok(()),
    }
}

fn strings(interface: &str, key: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(parse_error(interface, format!("{key} entries must be strings"))),
            })
            .collect(),
        _ => Err(parse_error(interface, format!("{key} must be a string or a list"))),
    }
}

fn snap_types(interface: &str, value: &Value) -> Result<Vec<SnapType>> {
    strings(interface, "snap-type", value)?
        .iter()
        .map(|s| {
            s.parse::<SnapType>()
                .map_err(|_| parse_error(interface, format!("unknown snap type {s:?}")))
        })
        .collect()
}

/// The body of a rule.
#[derive(Debug, Clone)]
pub enum RuleBody {
    /// `true` always applies, `false` never does.
    Always(bool),
    /// Applies when any alternative holds.
    Alternatives(Vec<ConstraintSet>),
}

impl RuleBody {
    pub fn applies(&self, subject: &Subject<'_>) -> std::result::Result<(), String> {
        match self {
            RuleBody::Always(true) => Ok(()),
            RuleBody::Always(false) => Err("rule is false".to_string()),
            RuleBody::Alternatives(alternatives) => {
                let mut first_failure = None;
                for alternative in alternatives {
                    match alternative.check(subject) {
                        Ok(()) => return Ok(()),
                        Err(reason) => {
                            first_failure.get_or_insert(reason);
                        }
                    }
                }
                Err(first_failure.unwrap_or_else(|| "no alternatives".to_string()))
            }
        }
    }
}

/// A single `<action>-<scope>` rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub action: Action,
    pub scope: Scope,
    pub side: Side,
    pub body: RuleBody,
}

impl Rule {
    pub fn key(&self) -> String {
        format!("{}-{}", self.action, self.scope)
    }
}

/// What one side of the base declaration says about a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideVerdict {
    /// An allow rule applies and no deny rule does.
    Allow,
    /// A deny rule applies, or allow rules exist and none applies.
    Deny(String),
    /// The side has no rules for the scope.
    Abstain,
}

/// Ordered rules from one side of the base declaration for one interface.
#[derive(Debug, Clone)]
pub struct RuleSet {
    interface: String,
    side: Side,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// A rule set with no rules.
    pub fn empty(interface: impl Into<String>, side: Side) -> Self {
        Self {
            interface: interface.into(),
            side,
            rules: Vec::new(),
        }
    }

    /// Parse rule text of the form `<interface>: { <action>-<scope>: ... }`.
    ///
    /// Blank text yields an empty rule set.
    pub fn parse(interface: &str, side: Side, text: &str) -> Result<Self> {
        let mut set = Self::empty(interface, side);
        if text.trim().is_empty() {
            return Ok(set);
        }

        let doc: Value =
            serde_yaml::from_str(text).map_err(|e| parse_error(interface, e.to_string()))?;
        let Value::Mapping(top) = doc else {
            return Err(parse_error(interface, "expected a map keyed by interface name"));
        };
        if top.len() != 1 {
            return Err(parse_error(interface, "expected exactly one interface"));
        }
        let Some((Value::String(found), body)) = top.iter().next() else {
            return Err(parse_error(interface, "interface name must be a string"));
        };
        if found != interface {
            return Err(Error::InterfaceMismatch {
                expected: interface.to_string(),
                found: found.clone(),
            });
        }
        let rules = match body {
            Value::Mapping(rules) => rules,
            Value::Null => return Ok(set),
            _ => return Err(parse_error(interface, "rules must be a map")),
        };

        for (key, value) in rules {
            let Value::String(key) = key else {
                return Err(parse_error(interface, "rule keys must be strings"));
            };
            let (action, scope) = Scope::parse_rule_key(key)
                .ok_or_else(|| parse_error(interface, format!("unknown rule {key:?}")))?;
            let body = parse_body(interface, side, scope, value)?;
            set.rules.push(Rule {
                action,
                scope,
                side,
                body,
            });
        }
        Ok(set)
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate this side's rules for `scope`.
    ///
    /// Deny rules are checked first and veto. Otherwise an applying allow
    /// rule grants; allow rules that exist but don't apply deny.
    pub fn evaluate(&self, scope: Scope, subject: &Subject<'_>) -> SideVerdict {
        let in_scope = |action: Action| {
            self.rules
                .iter()
                .filter(move |r| r.scope == scope && r.action == action)
        };

        for rule in in_scope(Action::Deny) {
            if rule.body.applies(subject).is_ok() {
                return SideVerdict::Deny(format!(
                    "{} rule {} of interface {:?} applies",
                    self.side,
                    rule.key(),
                    self.interface
                ));
            }
        }

        let mut first_failure = None;
        for rule in in_scope(Action::Allow) {
            match rule.body.applies(subject) {
                Ok(()) => return SideVerdict::Allow,
                Err(reason) => {
                    first_failure.get_or_insert((rule.key(), reason));
                }
            }
        }
        match first_failure {
            Some((key, reason)) => SideVerdict::Deny(format!(
                "{} rule {key} of interface {:?} not satisfied: {reason}",
                self.side, self.interface
            )),
            None => SideVerdict::Abstain,
        }
    }
}

fn parse_body(interface: &str, side: Side, scope: Scope, value: &Value) -> Result<RuleBody> {
    match value {
        Value::Bool(b) => Ok(RuleBody::Always(*b)),
        Value::String(s) if s == "true" || s == "false" => Ok(RuleBody::Always(s == "true")),
        Value::Mapping(mapping) => Ok(RuleBody::Alternatives(vec![ConstraintSet::parse(
            interface, side, scope, mapping,
        )?])),
        Value::Sequence(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Value::Mapping(mapping) => ConstraintSet::parse(interface, side, scope, mapping),
                _ => Err(parse_error(interface, "alternatives must be maps")),
            })
            .collect::<Result<Vec<_>>>()
            .map(RuleBody::Alternatives),
        _ => Err(parse_error(
            interface,
            "rule must be true, false, a constraint map or a list of them",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snap::AttributeSet;

    const SLOTS: &str = r#"
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

    fn slot(name: &str, snap_type: SnapType) -> SlotInfo {
        let mut slot = SlotInfo::new(
            "provider",
            "q",
            "msg-queue",
            AttributeSet::from_pairs([("name", name)]).unwrap(),
        );
        slot.snap_type = snap_type;
        slot
    }

    fn plug(name: &str) -> PlugInfo {
        PlugInfo::new(
            "consumer",
            "q",
            "msg-queue",
            AttributeSet::from_pairs([("name", name)]).unwrap(),
        )
    }

    #[test]
    fn test_parse_preserves_order() {
        let set = RuleSet::parse("msg-queue", Side::Slot, SLOTS).unwrap();
        let keys: Vec<_> = set.rules().iter().map(Rule::key).collect();
        assert_eq!(
            keys,
            vec!["allow-installation", "deny-connection", "allow-auto-connection"]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RuleSet::parse("other", Side::Slot, SLOTS),
            Err(Error::InterfaceMismatch { .. })
        ));
        assert!(RuleSet::parse("x", Side::Slot, "x:\n  allow-everything: true").is_err());
        assert!(RuleSet::parse("x", Side::Slot, "x:\n  allow-connection: 3").is_err());
        let text = "x:\n  allow-connection:\n    slot-colour: red";
        assert!(RuleSet::parse("x", Side::Slot, text).is_err());
        // installation rules only constrain their own side
        assert!(
            RuleSet::parse("x", Side::Slot, "x:\n  allow-installation:\n    plug-snap-type: app")
                .is_err()
        );
        assert!(
            RuleSet::parse(
                "x",
                Side::Plug,
                "x:\n  allow-installation:\n    plug-attributes:\n      name: $SLOT(name)"
            )
            .is_err()
        );
        assert!(RuleSet::parse("x", Side::Plug, "").unwrap().is_empty());
    }

    #[test]
    fn test_installation() {
        let set = RuleSet::parse("msg-queue", Side::Slot, SLOTS).unwrap();
        let app = slot("/q", SnapType::App);
        let kernel = slot("/q", SnapType::Kernel);

        assert_eq!(
            set.evaluate(Scope::Installation, &Subject::InstallSlot(&app)),
            SideVerdict::Allow
        );
        assert!(matches!(
            set.evaluate(Scope::Installation, &Subject::InstallSlot(&kernel)),
            SideVerdict::Deny(_)
        ));
    }

    #[test]
    fn test_deny_connection_vetoes() {
        let set = RuleSet::parse("msg-queue", Side::Slot, SLOTS).unwrap();
        let slot = slot("/sp-server", SnapType::App);
        let plug = plug("/sp-server");
        let subject = Subject::Connect {
            plug: &plug,
            slot: &slot,
        };
        assert!(matches!(
            set.evaluate(Scope::Connection, &subject),
            SideVerdict::Deny(_)
        ));
    }

    #[test]
    fn test_auto_connection_back_reference() {
        let set = RuleSet::parse("msg-queue", Side::Slot, SLOTS).unwrap();
        let slot = slot("/sp-server", SnapType::App);
        let same = plug("/sp-server");
        let other = plug("/sp-other");

        let verdict = set.evaluate(
            Scope::AutoConnection,
            &Subject::Connect {
                plug: &same,
                slot: &slot,
            },
        );
        assert_eq!(verdict, SideVerdict::Allow);

        let verdict = set.evaluate(
            Scope::AutoConnection,
            &Subject::Connect {
                plug: &other,
                slot: &slot,
            },
        );
        assert!(matches!(verdict, SideVerdict::Deny(reason) if reason.contains("not satisfied")));
    }

    #[test]
    fn test_abstain_without_rules() {
        let set = RuleSet::parse("msg-queue", Side::Plug, "").unwrap();
        let slot = slot("/q", SnapType::App);
        let plug = plug("/q");
        let subject = Subject::Connect {
            plug: &plug,
            slot: &slot,
        };
        assert_eq!(set.evaluate(Scope::AutoConnection, &subject), SideVerdict::Abstain);
    }

    #[test]
    fn test_alternatives_and_literals() {
        let text = r#"
x:
  allow-connection:
    - plug-names: [a]
    - plug-names: [b]
  deny-auto-connection: true
"#;
        let set = RuleSet::parse("x", Side::Plug, text).unwrap();
        let slot = SlotInfo::new("p", "s", "x", AttributeSet::empty());
        let b = PlugInfo::new("c", "b", "x", AttributeSet::empty());
        let c = PlugInfo::new("c", "c", "x", AttributeSet::empty());

        let connect_b = Subject::Connect {
            plug: &b,
            slot: &slot,
        };
        let connect_c = Subject::Connect {
            plug: &c,
            slot: &slot,
        };
        assert_eq!(
            set.evaluate(Scope::Connection, &connect_b),
            SideVerdict::Allow
        );
        assert!(matches!(
            set.evaluate(Scope::Connection, &connect_c),
            SideVerdict::Deny(_)
        ));
        assert!(matches!(
            set.evaluate(Scope::AutoConnection, &connect_b),
            SideVerdict::Deny(_)
        ));
    }
}
