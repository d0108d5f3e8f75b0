//! Per-backend accumulation of policy snippets.
//!
//! A [`Specification`] collects the snippets interfaces contribute for one
//! security backend during one compile pass. Snippets are keyed by
//! security tag. Each tag keeps its distinct snippets in first-insertion
//! order, and tags are listed in lexicographic order so that repeated
//! passes over the same input produce identical output.
//!
//! Hooks never name a tag themselves. The `add_*` entry points set the
//! tags of the consuming apps and hooks as the current context for the
//! duration of one hook call, and [`Specification::add_snippet`] writes to
//! that context. Adding outside of a context is an error.

pub mod apparmor;
pub mod seccomp;

use crate::interface::Interface;
use crate::{Error, Result};
use snap::{ConnectedPlug, ConnectedSlot, PlugInfo, SlotInfo};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, trace};

/// A security backend and the interface hooks that feed it.
pub trait SecurityBackend: Sized {
    const NAME: &'static str;

    fn connected_plug(
        iface: &dyn Interface,
        spec: &mut Specification<Self>,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()>;

    fn connected_slot(
        iface: &dyn Interface,
        spec: &mut Specification<Self>,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()>;

    fn permanent_plug(
        iface: &dyn Interface,
        spec: &mut Specification<Self>,
        plug: &PlugInfo,
    ) -> Result<()>;

    fn permanent_slot(
        iface: &dyn Interface,
        spec: &mut Specification<Self>,
        slot: &SlotInfo,
    ) -> Result<()>;
}

/// Snippets accumulated for one backend.
///
/// Not meant for concurrent mutation; one compile pass owns one instance.
pub struct Specification<B> {
    snippets: BTreeMap<String, Vec<String>>,
    context: Vec<String>,
    backend: PhantomData<fn() -> B>,
}

impl<B: SecurityBackend> Specification<B> {
    pub fn new() -> Self {
        Self {
            snippets: BTreeMap::new(),
            context: Vec::new(),
            backend: PhantomData,
        }
    }

    /// Add a snippet for every tag of the running hook.
    pub fn add_snippet(&mut self, snippet: impl Into<String>) -> Result<()> {
        if self.context.is_empty() {
            return Err(Error::NoSecurityContext);
        }
        let snippet = snippet.into();
        for tag in self.context.clone() {
            self.insert(tag, &snippet);
        }
        Ok(())
    }

    /// Add a snippet for one tag of the running hook.
    pub fn add_snippet_for_tag(&mut self, tag: &str, snippet: impl Into<String>) -> Result<()> {
        if self.context.is_empty() {
            return Err(Error::NoSecurityContext);
        }
        if !self.context.iter().any(|t| t == tag) {
            return Err(Error::TagOutsideContext {
                tag: tag.to_string(),
                current: self.context.clone(),
            });
        }
        self.insert(tag.to_string(), &snippet.into());
        Ok(())
    }

    fn insert(&mut self, tag: String, snippet: &str) {
        let snippets = self.snippets.entry(tag).or_default();
        if snippets.iter().any(|s| s == snippet) {
            return;
        }
        snippets.push(snippet.to_string());
        trace!(backend = B::NAME, len = snippet.len(), "snippet added");
    }

    /// All distinct snippets of `tag` concatenated in insertion order.
    pub fn snippet_for_tag(&self, tag: &str) -> String {
        self.snippets
            .get(tag)
            .map(|snippets| snippets.concat())
            .unwrap_or_default()
    }

    pub fn snippets_for_tag(&self, tag: &str) -> &[String] {
        self.snippets.get(tag).map(Vec::as_slice).unwrap_or_default()
    }

    /// Tags that received at least one snippet, sorted.
    pub fn security_tags(&self) -> Vec<String> {
        self.snippets.keys().cloned().collect()
    }

    /// Tags of the hook currently running, if any.
    pub fn current_security_tags(&self) -> &[String] {
        &self.context
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Run the connected-plug hook; snippets go to the plug's apps and hooks.
    pub fn add_connected_plug(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()> {
        self.within(plug.security_tags(), |spec| {
            B::connected_plug(iface, spec, plug, slot)
        })
    }

    /// Run the connected-slot hook; snippets go to the slot's apps and hooks.
    pub fn add_connected_slot(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug,
        slot: &ConnectedSlot,
    ) -> Result<()> {
        self.within(slot.security_tags(), |spec| {
            B::connected_slot(iface, spec, plug, slot)
        })
    }

    pub fn add_permanent_plug(&mut self, iface: &dyn Interface, plug: &PlugInfo) -> Result<()> {
        self.within(plug.security_tags(), |spec| {
            B::permanent_plug(iface, spec, plug)
        })
    }

    pub fn add_permanent_slot(&mut self, iface: &dyn Interface, slot: &SlotInfo) -> Result<()> {
        self.within(slot.security_tags(), |spec| {
            B::permanent_slot(iface, spec, slot)
        })
    }

    fn within(
        &mut self,
        tags: Vec<String>,
        hook: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        if tags.is_empty() {
            debug!(backend = B::NAME, "declaration bound to no app or hook, skipping");
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.context, tags);
        let result = hook(self);
        self.context = previous;
        result
    }
}

impl<B: SecurityBackend> Default for Specification<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: SecurityBackend> fmt::Debug for Specification<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("backend", &B::NAME)
            .field("snippets", &self.snippets)
            .field("context", &self.context)
            .finish()
    }
}
