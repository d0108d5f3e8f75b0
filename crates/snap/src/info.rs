//! Snap, app, hook, plug and slot declarations.

use crate::attrs::{AttrValue, AttributeSet, Attrer};
use crate::tag::{app_security_tag, hook_security_tag};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The kind of snap a declaration belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SnapType {
    #[default]
    App,
    Gadget,
    Kernel,
    Core,
    Base,
    Snapd,
}

impl SnapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapType::App => "app",
            SnapType::Gadget => "gadget",
            SnapType::Kernel => "kernel",
            SnapType::Core => "core",
            SnapType::Base => "base",
            SnapType::Snapd => "snapd",
        }
    }
}

impl fmt::Display for SnapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SnapType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "app" => Ok(SnapType::App),
            "gadget" => Ok(SnapType::Gadget),
            "kernel" => Ok(SnapType::Kernel),
            "core" | "os" => Ok(SnapType::Core),
            "base" => Ok(SnapType::Base),
            "snapd" => Ok(SnapType::Snapd),
            other => Err(Error::Parse(format!("unknown snap type {other:?}"))),
        }
    }
}

/// Check a snap, app, hook, plug or slot name.
///
/// Names are lowercase ASCII letters, digits and single inner hyphens, and
/// must contain at least one letter.
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
        && name.chars().any(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// An application shipped by a snap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub snap: String,
    pub name: String,
}

impl AppInfo {
    pub fn security_tag(&self) -> String {
        app_security_tag(&self.snap, &self.name)
    }
}

/// A hook shipped by a snap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInfo {
    pub snap: String,
    pub name: String,
}

impl HookInfo {
    pub fn security_tag(&self) -> String {
        hook_security_tag(&self.snap, &self.name)
    }
}

macro_rules! declaration {
    ($(#[$meta:meta])* $info:ident, $reference:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $info {
            pub snap: String,
            pub snap_type: SnapType,
            pub name: String,
            pub interface: String,
            pub attrs: AttributeSet,
            /// Apps this declaration is bound to.
            pub apps: BTreeSet<String>,
            /// Hooks this declaration is bound to.
            pub hooks: BTreeSet<String>,
        }

        impl $info {
            pub fn new(
                snap: impl Into<String>,
                name: impl Into<String>,
                interface: impl Into<String>,
                attrs: AttributeSet,
            ) -> Self {
                Self {
                    snap: snap.into(),
                    snap_type: SnapType::default(),
                    name: name.into(),
                    interface: interface.into(),
                    attrs,
                    apps: BTreeSet::new(),
                    hooks: BTreeSet::new(),
                }
            }

            pub fn reference(&self) -> $reference {
                $reference::new(self.snap.clone(), self.name.clone())
            }

            /// Tags of every app and hook this declaration is bound to, sorted.
            pub fn security_tags(&self) -> Vec<String> {
                let mut tags: Vec<String> = self
                    .apps
                    .iter()
                    .map(|app| app_security_tag(&self.snap, app))
                    .chain(self.hooks.iter().map(|hook| hook_security_tag(&self.snap, hook)))
                    .collect();
                tags.sort();
                tags
            }
        }

        impl Attrer for $info {
            fn lookup(&self, name: &str) -> Option<&AttrValue> {
                self.attrs.get(name)
            }
        }

        /// Stable `<snap>:<name>` reference.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $reference {
            pub snap: String,
            pub name: String,
        }

        impl $reference {
            pub fn new(snap: impl Into<String>, name: impl Into<String>) -> Self {
                Self {
                    snap: snap.into(),
                    name: name.into(),
                }
            }
        }

        impl fmt::Display for $reference {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", self.snap, self.name)
            }
        }

        impl FromStr for $reference {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let (snap, name) = s
                    .split_once(':')
                    .ok_or_else(|| Error::InvalidReference(s.to_string()))?;
                validate_name("snap", snap)?;
                validate_name($kind, name)?;
                Ok(Self::new(snap, name))
            }
        }
    };
}

declaration!(
    /// A snap's declared consumption of an interface.
    PlugInfo,
    PlugRef,
    "plug"
);

declaration!(
    /// A snap's declared provision of an interface.
    SlotInfo,
    SlotRef,
    "slot"
);

/// Structured snap metadata.
///
/// Plugs and slots are shared behind [`Arc`] so connections can hold them
/// without copying; they are never mutated once the snap is built.
///
/// A plug or slot added without a binding stays bound to every app and
/// hook, including ones added after it.
#[derive(Debug, Clone)]
pub struct Info {
    name: String,
    snap_type: SnapType,
    apps: BTreeMap<String, AppInfo>,
    hooks: BTreeMap<String, HookInfo>,
    plugs: BTreeMap<String, Arc<PlugInfo>>,
    slots: BTreeMap<String, Arc<SlotInfo>>,
    unbound_plugs: BTreeSet<String>,
    unbound_slots: BTreeSet<String>,
}

impl Info {
    /// Start an empty snap.
    pub fn new(name: impl Into<String>, snap_type: SnapType) -> Result<Self> {
        let name = name.into();
        validate_name("snap", &name)?;
        Ok(Self {
            name,
            snap_type,
            apps: BTreeMap::new(),
            hooks: BTreeMap::new(),
            plugs: BTreeMap::new(),
            slots: BTreeMap::new(),
            unbound_plugs: BTreeSet::new(),
            unbound_slots: BTreeSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snap_type(&self) -> SnapType {
        self.snap_type
    }

    pub fn apps(&self) -> &BTreeMap<String, AppInfo> {
        &self.apps
    }

    pub fn hooks(&self) -> &BTreeMap<String, HookInfo> {
        &self.hooks
    }

    pub fn plugs(&self) -> &BTreeMap<String, Arc<PlugInfo>> {
        &self.plugs
    }

    pub fn slots(&self) -> &BTreeMap<String, Arc<SlotInfo>> {
        &self.slots
    }

    pub fn plug(&self, name: &str) -> Option<&Arc<PlugInfo>> {
        self.plugs.get(name)
    }

    pub fn slot(&self, name: &str) -> Option<&Arc<SlotInfo>> {
        self.slots.get(name)
    }

    pub fn add_app(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name("app", &name)?;
        for plug in &self.unbound_plugs {
            if let Some(plug) = self.plugs.get_mut(plug) {
                Arc::make_mut(plug).apps.insert(name.clone());
            }
        }
        for slot in &self.unbound_slots {
            if let Some(slot) = self.slots.get_mut(slot) {
                Arc::make_mut(slot).apps.insert(name.clone());
            }
        }
        self.apps.insert(
            name.clone(),
            AppInfo {
                snap: self.name.clone(),
                name,
            },
        );
        Ok(())
    }

    pub fn add_hook(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        validate_name("hook", &name)?;
        for plug in &self.unbound_plugs {
            if let Some(plug) = self.plugs.get_mut(plug) {
                Arc::make_mut(plug).hooks.insert(name.clone());
            }
        }
        for slot in &self.unbound_slots {
            if let Some(slot) = self.slots.get_mut(slot) {
                Arc::make_mut(slot).hooks.insert(name.clone());
            }
        }
        self.hooks.insert(
            name.clone(),
            HookInfo {
                snap: self.name.clone(),
                name,
            },
        );
        Ok(())
    }

    /// Add a plug; an empty binding set binds it to every app and hook.
    pub fn add_plug(&mut self, mut plug: PlugInfo) -> Result<()> {
        validate_name("plug", &plug.name)?;
        plug.snap = self.name.clone();
        plug.snap_type = self.snap_type;
        if plug.apps.is_empty() && plug.hooks.is_empty() {
            plug.apps = self.apps.keys().cloned().collect();
            plug.hooks = self.hooks.keys().cloned().collect();
            self.unbound_plugs.insert(plug.name.clone());
        } else {
            self.unbound_plugs.remove(&plug.name);
        }
        self.plugs.insert(plug.name.clone(), Arc::new(plug));
        Ok(())
    }

    /// Add a slot; an empty binding set binds it to every app and hook.
    pub fn add_slot(&mut self, mut slot: SlotInfo) -> Result<()> {
        validate_name("slot", &slot.name)?;
        slot.snap = self.name.clone();
        slot.snap_type = self.snap_type;
        if slot.apps.is_empty() && slot.hooks.is_empty() {
            slot.apps = self.apps.keys().cloned().collect();
            slot.hooks = self.hooks.keys().cloned().collect();
            self.unbound_slots.insert(slot.name.clone());
        } else {
            self.unbound_slots.remove(&slot.name);
        }
        self.slots.insert(slot.name.clone(), Arc::new(slot));
        Ok(())
    }

    /// Drop every plug and slot whose interface `known` rejects.
    ///
    /// Returns a description of each dropped declaration.
    pub fn retain_interfaces(&mut self, known: impl Fn(&str) -> bool) -> Vec<String> {
        let mut dropped = Vec::new();
        self.plugs.retain(|name, plug| {
            let keep = known(&plug.interface);
            if !keep {
                self.unbound_plugs.remove(name);
                dropped.push(format!("plug {name} (unknown interface {:?})", plug.interface));
            }
            keep
        });
        self.slots.retain(|name, slot| {
            let keep = known(&slot.interface);
            if !keep {
                self.unbound_slots.remove(name);
                dropped.push(format!("slot {name} (unknown interface {:?})", slot.interface));
            }
            keep
        });
        dropped
    }
}
