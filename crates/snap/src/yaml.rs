//! Loader for `snap.yaml`-style metadata.
//!
//! Only the parts that matter for interface handling are read: name, type,
//! apps, hooks, plugs and slots. Unknown keys are ignored.

use crate::attrs::{AttrValue, AttributeSet};
use crate::info::{Info, PlugInfo, SlotInfo, SnapType};
use crate::{Error, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SnapYaml {
    name: String,
    #[serde(rename = "type", default)]
    snap_type: Option<String>,
    #[serde(default)]
    plugs: BTreeMap<String, Value>,
    #[serde(default)]
    slots: BTreeMap<String, Value>,
    #[serde(default)]
    apps: BTreeMap<String, Option<AppYaml>>,
    #[serde(default)]
    hooks: BTreeMap<String, Option<AppYaml>>,
}

#[derive(Debug, Default, Deserialize)]
struct AppYaml {
    #[serde(default)]
    plugs: Vec<String>,
    #[serde(default)]
    slots: Vec<String>,
}

/// Which apps and hooks name a plug or slot.
#[derive(Debug, Default)]
struct Binding {
    apps: BTreeSet<String>,
    hooks: BTreeSet<String>,
}

impl Info {
    /// Parse snap metadata from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: SnapYaml = serde_yaml::from_str(yaml).map_err(|e| Error::Parse(e.to_string()))?;
        let snap_type = match raw.snap_type.as_deref() {
            Some(t) => t.parse()?,
            None => SnapType::default(),
        };
        let mut info = Info::new(raw.name, snap_type)?;

        let mut plug_bindings: BTreeMap<String, Binding> = BTreeMap::new();
        let mut slot_bindings: BTreeMap<String, Binding> = BTreeMap::new();

        for (name, app) in &raw.apps {
            let app = app.as_ref();
            info.add_app(name)?;
            for plug in app.map(|a| a.plugs.as_slice()).unwrap_or_default() {
                plug_bindings.entry(plug.clone()).or_default().apps.insert(name.clone());
            }
            for slot in app.map(|a| a.slots.as_slice()).unwrap_or_default() {
                slot_bindings.entry(slot.clone()).or_default().apps.insert(name.clone());
            }
        }
        for (name, hook) in &raw.hooks {
            let hook = hook.as_ref();
            info.add_hook(name)?;
            for plug in hook.map(|h| h.plugs.as_slice()).unwrap_or_default() {
                plug_bindings.entry(plug.clone()).or_default().hooks.insert(name.clone());
            }
            for slot in hook.map(|h| h.slots.as_slice()).unwrap_or_default() {
                slot_bindings.entry(slot.clone()).or_default().hooks.insert(name.clone());
            }
        }

        // Names used only by apps or hooks declare an implicit plug or slot
        // on the interface of the same name.
        let mut plugs = raw.plugs;
        for name in plug_bindings.keys() {
            plugs.entry(name.clone()).or_insert(Value::Null);
        }
        let mut slots = raw.slots;
        for name in slot_bindings.keys() {
            slots.entry(name.clone()).or_insert(Value::Null);
        }

        for (name, value) in plugs {
            let (interface, attrs) = declaration(&name, value)?;
            let mut plug = PlugInfo::new(info.name(), &name, interface, attrs);
            if let Some(binding) = plug_bindings.remove(&name) {
                plug.apps = binding.apps;
                plug.hooks = binding.hooks;
            }
            info.add_plug(plug)?;
        }
        for (name, value) in slots {
            let (interface, attrs) = declaration(&name, value)?;
            let mut slot = SlotInfo::new(info.name(), &name, interface, attrs);
            if let Some(binding) = slot_bindings.remove(&name) {
                slot.apps = binding.apps;
                slot.hooks = binding.hooks;
            }
            info.add_slot(slot)?;
        }

        Ok(info)
    }

    /// Read and parse snap metadata from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

/// Split a plug or slot body into its interface name and attributes.
fn declaration(name: &str, value: Value) -> Result<(String, AttributeSet)> {
    match value {
        Value::Null => Ok((name.to_string(), AttributeSet::empty())),
        Value::String(interface) => Ok((interface, AttributeSet::empty())),
        Value::Mapping(mapping) => {
            let mut interface = name.to_string();
            let mut attrs = BTreeMap::new();
            for (key, value) in mapping {
                let key = match key {
                    Value::String(key) => key,
                    other => {
                        return Err(Error::Parse(format!(
                            "{name}: attribute key must be a string, got {other:?}"
                        )));
                    }
                };
                if key == "interface" {
                    interface = match value {
                        Value::String(s) => s,
                        other => {
                            return Err(Error::Parse(format!(
                                "{name}: interface must be a string, got {other:?}"
                            )));
                        }
                    };
                    continue;
                }
                let value = attr_value(&key, value)?;
                attrs.insert(key, value);
            }
            Ok((interface, AttributeSet::new(attrs)?))
        }
        other => Err(Error::Parse(format!(
            "{name}: expected interface name or attribute map, got {other:?}"
        ))),
    }
}

fn attr_value(name: &str, value: Value) -> Result<AttrValue> {
    let invalid = |reason: String| Error::InvalidAttribute {
        name: name.to_string(),
        reason,
    };
    match value {
        Value::Bool(b) => Ok(AttrValue::Bool(b)),
        Value::Number(n) => n
            .as_i64()
            .map(AttrValue::Int)
            .ok_or_else(|| invalid(format!("unsupported number {n}"))),
        Value::String(s) => Ok(AttrValue::String(s)),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| attr_value(name, item))
            .collect::<Result<Vec<_>>>()
            .map(AttrValue::List),
        Value::Mapping(mapping) => {
            let mut map = BTreeMap::new();
            for (key, value) in mapping {
                let Value::String(key) = key else {
                    return Err(invalid("map keys must be strings".to_string()));
                };
                let value = attr_value(name, value)?;
                map.insert(key, value);
            }
            Ok(AttrValue::Map(map))
        }
        Value::Null => Err(invalid("value is empty".to_string())),
        Value::Tagged(_) => Err(invalid("tagged values are not supported".to_string())),
    }
}
