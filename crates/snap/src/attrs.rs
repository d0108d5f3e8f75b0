//! Typed attribute values attached to plug and slot declarations.

use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Keys a declaration uses for itself and that can't double as attributes.
const RESERVED_KEYS: &[&str] = &["interface", "bind"];

/// A single declared attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::String(_) => "string",
            AttrValue::List(_) => "list",
            AttrValue::Map(_) => "map",
        }
    }

    /// Look up a dotted path (`a.b.c`) through nested maps.
    pub fn lookup_path(&self, path: &str) -> Option<&AttrValue> {
        path.split('.').try_fold(self, |value, key| match value {
            AttrValue::Map(map) => map.get(key),
            _ => None,
        })
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::String(s) => write!(f, "{s}"),
            AttrValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            AttrValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// Validated, immutable mapping of attribute name to value.
///
/// Construction is the only point where attributes are checked; there are
/// no mutators afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributeSet {
    attrs: BTreeMap<String, AttrValue>,
}

impl AttributeSet {
    /// Validate and wrap a raw attribute map.
    pub fn new(attrs: BTreeMap<String, AttrValue>) -> Result<Self> {
        for name in attrs.keys() {
            check_attr_name(name)?;
        }
        Ok(Self { attrs })
    }

    /// An attribute set with no attributes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<AttrValue>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        match name.split_once('.') {
            None => self.attrs.get(name),
            Some((head, rest)) => self.attrs.get(head)?.lookup_path(rest),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

fn check_attr_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.starts_with('$') {
        Some("names starting with '$' are reserved")
    } else if name.contains('.') {
        Some("'.' is reserved for attribute paths")
    } else if RESERVED_KEYS.contains(&name) {
        Some("name is reserved")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidAttribute {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Conversion from a borrowed attribute value to a concrete Rust type.
pub trait FromAttr<'a>: Sized {
    const TYPE_NAME: &'static str;

    fn from_attr(value: &'a AttrValue) -> Option<Self>;
}

impl<'a> FromAttr<'a> for &'a str {
    const TYPE_NAME: &'static str = "string";

    fn from_attr(value: &'a AttrValue) -> Option<Self> {
        match value {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromAttr<'_> for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_attr(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromAttr<'_> for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_attr(value: &AttrValue) -> Option<Self> {
        match value {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl<'a> FromAttr<'a> for &'a [AttrValue] {
    const TYPE_NAME: &'static str = "list";

    fn from_attr(value: &'a AttrValue) -> Option<Self> {
        match value {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl<'a> FromAttr<'a> for &'a BTreeMap<String, AttrValue> {
    const TYPE_NAME: &'static str = "map";

    fn from_attr(value: &'a AttrValue) -> Option<Self> {
        match value {
            AttrValue::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Read access to the attributes of a declaration or connection end.
///
/// The typed accessors never coerce: a missing attribute is
/// [`Error::AttributeNotFound`] and a mismatched one is
/// [`Error::AttributeType`].
pub trait Attrer {
    /// Raw lookup by name or dotted path.
    fn lookup(&self, name: &str) -> Option<&AttrValue>;

    fn attr<'a, T: FromAttr<'a>>(&'a self, name: &str) -> Result<T>
    where
        Self: Sized,
    {
        typed(self.lookup(name), name)
    }

    fn str_attr(&self, name: &str) -> Result<&str> {
        typed(self.lookup(name), name)
    }

    fn int_attr(&self, name: &str) -> Result<i64> {
        typed(self.lookup(name), name)
    }

    fn bool_attr(&self, name: &str) -> Result<bool> {
        typed(self.lookup(name), name)
    }
}

impl Attrer for AttributeSet {
    fn lookup(&self, name: &str) -> Option<&AttrValue> {
        self.get(name)
    }
}

fn typed<'a, T: FromAttr<'a>>(value: Option<&'a AttrValue>, name: &str) -> Result<T> {
    let value = value.ok_or_else(|| Error::AttributeNotFound {
        name: name.to_string(),
    })?;
    T::from_attr(value).ok_or_else(|| Error::AttributeType {
        name: name.to_string(),
        expected: T::TYPE_NAME,
        found: value.type_name(),
    })
}
