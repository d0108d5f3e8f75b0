//! The set of known interfaces and their base declaration.

use crate::builtin;
use crate::interface::Interface;
use crate::{Error, Result};
use policy::BaseDeclaration;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Every known interface, keyed by name, plus the base declaration parsed
/// from their rule text.
///
/// Built once at startup and read-only afterwards; share it behind an
/// `Arc` between compile passes.
pub struct Registry {
    interfaces: BTreeMap<String, Box<dyn Interface>>,
    base: BaseDeclaration,
}

impl Registry {
    /// Register `interfaces` and parse their base declaration rules.
    pub fn new(interfaces: impl IntoIterator<Item = Box<dyn Interface>>) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        let mut base = BaseDeclaration::new();
        for iface in interfaces {
            let name = iface.name().to_string();
            if by_name.contains_key(&name) {
                return Err(Error::DuplicateInterface(name));
            }
            let info = iface.static_info();
            base.add_interface(
                &name,
                info.base_declaration_plugs,
                info.base_declaration_slots,
            )?;
            debug!(interface = %name, "registered interface");
            by_name.insert(name, iface);
        }
        Ok(Self {
            interfaces: by_name,
            base,
        })
    }

    /// A registry of the built-in interfaces.
    pub fn builtin() -> Result<Self> {
        Self::new(builtin::interfaces())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Interface> {
        self.interfaces.get(name).map(|iface| iface.as_ref())
    }

    /// Like [`Registry::get`], but an unknown name is an error.
    pub fn require(&self, name: &str) -> Result<&dyn Interface> {
        self.get(name)
            .ok_or_else(|| Error::UnknownInterface(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Registered interfaces in name order.
    pub fn interfaces(&self) -> impl Iterator<Item = &dyn Interface> {
        self.interfaces.values().map(|iface| iface.as_ref())
    }

    pub fn base_declaration(&self) -> &BaseDeclaration {
        &self.base
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("interfaces", &self.interfaces.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
