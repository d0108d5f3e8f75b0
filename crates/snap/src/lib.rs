//! Snap declarations as seen by the interface engine.
//!
//! This crate models the parts of an installed snap that interface
//! handling works with: the snap itself, its apps and hooks, the plugs and
//! slots it declares, and the attributes attached to them.
//!
//! # Core Concepts
//!
//! ## Info
//!
//! [`Info`] owns every declaration of one snap. Plugs and slots are bound
//! to the apps and hooks that name them, or to all of them when none do.
//!
//! ## Attributes
//!
//! An [`AttributeSet`] is validated once when built and never mutated.
//! The [`Attrer`] trait gives typed lookups that fail with
//! [`Error::AttributeNotFound`] or [`Error::AttributeType`] instead of
//! coercing.
//!
//! ## Security tags
//!
//! Every app and hook has a security tag (`snap.<snap>.<app>` or
//! `snap.<snap>.hook.<hook>`) used to key generated policy. See
//! [`app_security_tag`] and [`hook_security_tag`].
//!
//! # Example
//!
//! ```
//! use snap::{Attrer, Info};
//!
//! let info = Info::from_yaml(r#"
//! name: demo
//! slots:
//!   queue:
//!     interface: msg-queue
//!     name: /demo
//! apps:
//!   server:
//!     slots: [queue]
//! "#)?;
//!
//! let slot = info.slot("queue").unwrap();
//! assert_eq!(slot.str_attr("name")?, "/demo");
//! assert_eq!(slot.security_tags(), vec!["snap.demo.server"]);
//! # Ok::<(), snap::Error>(())
//! ```

mod attrs;
mod connected;
mod error;
mod info;
mod tag;
mod yaml;

pub use attrs::{AttrValue, AttributeSet, Attrer, FromAttr};
pub use connected::{ConnectedPlug, ConnectedSlot};
pub use error::{Error, Result};
pub use info::{
    AppInfo, HookInfo, Info, PlugInfo, PlugRef, SlotInfo, SlotRef, SnapType, validate_name,
};
pub use tag::{app_security_tag, hook_security_tag};
