//! Attribute constraints.
//!
//! Constraints are checked in two steps. [`AttrConstraint::resolve`]
//! replaces every `$PLUG(..)`/`$SLOT(..)` back-reference with the
//! counterpart's actual value, producing a [`Resolved`] constraint with no
//! references left. [`Resolved::matches`] then checks a concrete attribute
//! value against it. Both steps are pure.

use crate::scope::Side;
use crate::{Error, Result};
use regex::Regex;
use serde_yaml::Value;
use snap::{AttrValue, Attrer};
use std::collections::BTreeMap;
use std::fmt;

const MISSING: &str = "$MISSING";

/// An anchored regular expression over a string attribute.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| Error::InvalidPattern {
            pattern: source.clone(),
            source: e,
        })?;
        Ok(Self { source, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// A reference to an attribute of the other end of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Side the attribute is read from.
    pub side: Side,
    /// Attribute name or dotted path.
    pub path: String,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Side::Plug => write!(f, "$PLUG({})", self.path),
            Side::Slot => write!(f, "$SLOT({})", self.path),
        }
    }
}

/// A constraint on one attribute, as written in rule text.
#[derive(Debug, Clone)]
pub enum AttrConstraint {
    Pattern(Pattern),
    Literal(AttrValue),
    Reference(Reference),
    /// The attribute must not be declared.
    Missing,
    Map(BTreeMap<String, AttrConstraint>),
    /// Any alternative may match; list values need every element to match one.
    Alternatives(Vec<AttrConstraint>),
}

/// A constraint with all back-references substituted.
#[derive(Debug, Clone)]
pub enum Resolved {
    Pattern(Pattern),
    Literal(AttrValue),
    Missing,
    Map(BTreeMap<String, Resolved>),
    Alternatives(Vec<Resolved>),
}

/// A back-reference whose target attribute does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved(pub Reference);

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot resolve {}", self.0)
    }
}

impl AttrConstraint {
    /// Substitute back-references with values read from `counterpart`.
    ///
    /// Without a counterpart (installation checks) any reference is
    /// unresolved.
    pub fn resolve(
        &self,
        counterpart: Option<&dyn Attrer>,
    ) -> std::result::Result<Resolved, Unresolved> {
        Ok(match self {
            AttrConstraint::Pattern(p) => Resolved::Pattern(p.clone()),
            AttrConstraint::Literal(v) => Resolved::Literal(v.clone()),
            AttrConstraint::Missing => Resolved::Missing,
            AttrConstraint::Reference(reference) => {
                let value = counterpart
                    .and_then(|c| c.lookup(&reference.path))
                    .ok_or_else(|| Unresolved(reference.clone()))?;
                Resolved::Literal(value.clone())
            }
            AttrConstraint::Map(map) => Resolved::Map(
                map.iter()
                    .map(|(k, c)| Ok((k.clone(), c.resolve(counterpart)?)))
                    .collect::<std::result::Result<_, Unresolved>>()?,
            ),
            AttrConstraint::Alternatives(alts) => Resolved::Alternatives(
                alts.iter()
                    .map(|c| c.resolve(counterpart))
                    .collect::<std::result::Result<_, Unresolved>>()?,
            ),
        })
    }

    fn has_references(&self) -> bool {
        match self {
            AttrConstraint::Reference(_) => true,
            AttrConstraint::Map(map) => map.values().any(AttrConstraint::has_references),
            AttrConstraint::Alternatives(alts) => alts.iter().any(AttrConstraint::has_references),
            _ => false,
        }
    }
}

impl Resolved {
    /// Whether `value` (`None` when undeclared) satisfies the constraint.
    ///
    /// Patterns must match the whole string. Back-references resolve to
    /// literals and so compare by equality, never as patterns.
    pub fn matches(&self, value: Option<&AttrValue>) -> bool {
        let Some(value) = value else {
            return matches!(self, Resolved::Missing);
        };
        match self {
            Resolved::Missing => false,
            Resolved::Literal(expected) => expected == value,
            Resolved::Pattern(pattern) => match value {
                AttrValue::String(s) => pattern.is_match(s),
                AttrValue::List(items) => {
                    !items.is_empty()
                        && items
                            .iter()
                            .all(|item| matches!(item, AttrValue::String(s) if pattern.is_match(s)))
                }
                _ => false,
            },
            Resolved::Map(constraints) => match value {
                AttrValue::Map(map) => constraints.iter().all(|(k, c)| c.matches(map.get(k))),
                _ => false,
            },
            Resolved::Alternatives(alts) => match value {
                AttrValue::List(items) => {
                    !items.is_empty()
                        && items
                            .iter()
                            .all(|item| alts.iter().any(|alt| alt.matches(Some(item))))
                }
                other => alts.iter().any(|alt| alt.matches(Some(other))),
            },
        }
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Pattern(p) => write!(f, "pattern {:?}", p.as_str()),
            Resolved::Literal(v) => write!(f, "{v:?}"),
            Resolved::Missing => f.write_str(MISSING),
            Resolved::Map(map) => {
                let keys: Vec<_> = map.keys().map(String::as_str).collect();
                write!(f, "map constraint on {keys:?}")
            }
            Resolved::Alternatives(alts) => write!(f, "one of {} alternatives", alts.len()),
        }
    }
}

/// Constraints on the top-level attributes of one side.
#[derive(Debug, Clone, Default)]
pub struct AttrConstraints {
    constraints: BTreeMap<String, AttrConstraint>,
}

impl AttrConstraints {
    /// Check `subject` against every constraint; the first failure wins.
    pub fn check(
        &self,
        subject: &dyn Attrer,
        counterpart: Option<&dyn Attrer>,
    ) -> std::result::Result<(), String> {
        for (name, constraint) in &self.constraints {
            let resolved = constraint
                .resolve(counterpart)
                .map_err(|e| format!("attribute {name:?}: {e}"))?;
            if !resolved.matches(subject.lookup(name)) {
                return Err(match subject.lookup(name) {
                    Some(value) => {
                        format!("attribute {name:?} value {value:?} does not match {resolved}")
                    }
                    None => format!("attribute {name:?} is not declared"),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AttrConstraint> {
        self.constraints.get(name)
    }

    pub(crate) fn has_references(&self) -> bool {
        self.constraints.values().any(AttrConstraint::has_references)
    }

    /// Parse a `plug-attributes`/`slot-attributes` map.
    ///
    /// `own` is the side the attributes belong to; back-references must
    /// point at the other side.
    pub(crate) fn parse(interface: &str, own: Side, value: &Value) -> Result<Self> {
        let Value::Mapping(mapping) = value else {
            return Err(parse_error(interface, format!("{own}-attributes must be a map")));
        };
        let mut constraints = BTreeMap::new();
        for (key, value) in mapping {
            let Value::String(name) = key else {
                return Err(parse_error(interface, "attribute names must be strings"));
            };
            constraints.insert(name.clone(), parse_constraint(interface, own, value)?);
        }
        Ok(Self { constraints })
    }
}

fn parse_constraint(interface: &str, own: Side, value: &Value) -> Result<AttrConstraint> {
    match value {
        Value::String(s) => parse_string_constraint(interface, own, s),
        Value::Bool(b) => Ok(AttrConstraint::Literal(AttrValue::Bool(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(|i| AttrConstraint::Literal(AttrValue::Int(i)))
            .ok_or_else(|| parse_error(interface, format!("unsupported number {n}"))),
        Value::Mapping(mapping) => {
            let mut map = BTreeMap::new();
            for (key, value) in mapping {
                let Value::String(key) = key else {
                    return Err(parse_error(interface, "attribute names must be strings"));
                };
                map.insert(key.clone(), parse_constraint(interface, own, value)?);
            }
            Ok(AttrConstraint::Map(map))
        }
        Value::Sequence(items) if !items.is_empty() => items
            .iter()
            .map(|item| parse_constraint(interface, own, item))
            .collect::<Result<Vec<_>>>()
            .map(AttrConstraint::Alternatives),
        Value::Sequence(_) => Err(parse_error(interface, "empty list of alternatives")),
        Value::Null | Value::Tagged(_) => Err(parse_error(
            interface,
            "attribute constraint must be a string, scalar, list or map",
        )),
    }
}

fn parse_string_constraint(interface: &str, own: Side, s: &str) -> Result<AttrConstraint> {
    if s == MISSING {
        return Ok(AttrConstraint::Missing);
    }
    if !s.starts_with('$') {
        return Pattern::new(s).map(AttrConstraint::Pattern);
    }

    let reference = if let Some(path) = s.strip_prefix("$SLOT(").and_then(|r| r.strip_suffix(')')) {
        Reference {
            side: Side::Slot,
            path: path.to_string(),
        }
    } else if let Some(path) = s.strip_prefix("$PLUG(").and_then(|r| r.strip_suffix(')')) {
        Reference {
            side: Side::Plug,
            path: path.to_string(),
        }
    } else {
        return Err(parse_error(interface, format!("unknown reference {s:?}")));
    };

    if reference.path.is_empty() {
        return Err(parse_error(interface, format!("empty reference {s:?}")));
    }
    if reference.side != own.counterpart() {
        return Err(parse_error(
            interface,
            format!("{own}-attributes can only refer to the {}", own.counterpart()),
        ));
    }
    Ok(AttrConstraint::Reference(reference))
}

pub(crate) fn parse_error(interface: &str, reason: impl Into<String>) -> Error {
    Error::Parse {
        interface: interface.to_string(),
        reason: reason.into(),
    }
}
