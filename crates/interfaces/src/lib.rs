//! Interface engine: validation, connection decisions and security snippets.
//!
//! # Core Concepts
//!
//! ## Interfaces
//!
//! An [`Interface`] is one capability type. It validates the attributes of
//! the plugs and slots that use it, has the final say on auto-connections
//! the base declaration allows, and contributes snippets to each security
//! backend through per-backend hooks.
//!
//! ## Registry
//!
//! The [`Registry`] is built once at startup from a list of interfaces and
//! parses their base declaration. It is never mutated afterwards.
//!
//! ## Decisions
//!
//! The [`ConnectionDecisionEngine`] combines the base declaration with
//! [`Interface::auto_connect`]. Every path that is not explicitly allowed
//! ends in [`Decision::Denied`] with a reason.
//!
//! ## Specifications
//!
//! A [`Specification`] accumulates the snippets of one backend, keyed by
//! security tag. [`Repository::specification`] runs a full, deterministic
//! compile pass over the installed snaps and their connections.
//!
//! # Example
//!
//! ```
//! use interfaces::{ConnectMode, Registry, Repository};
//! use interfaces::security::apparmor::AppArmor;
//! use snap::Info;
//! use std::sync::Arc;
//!
//! let mut repo = Repository::new(Arc::new(Registry::builtin()?));
//! repo.add_snap(Info::from_yaml(r#"
//! name: provider
//! slots:
//!   queue: {interface: msg-queue, name: /jobs}
//! apps:
//!   server: {}
//! "#)?)?;
//! repo.add_snap(Info::from_yaml(r#"
//! name: consumer
//! plugs:
//!   queue: {interface: msg-queue, name: /jobs}
//! apps:
//!   worker: {}
//! "#)?)?;
//!
//! assert_eq!(repo.auto_connect("consumer")?.len(), 1);
//! let spec = repo.specification::<AppArmor>()?;
//! assert_eq!(spec.snippet_for_tag("snap.consumer.worker"), "/jobs rw,\n");
//! # Ok::<(), interfaces::Error>(())
//! ```

pub mod builtin;
mod decision;
mod error;
mod interface;
mod registry;
mod repo;
pub mod security;

pub use decision::{ConnectMode, ConnectionDecisionEngine, Decision};
pub use error::{Error, Result};
pub use interface::{
    Interface, StaticInfo, ValidationError, before_prepare_plug, before_prepare_slot,
};
pub use registry::Registry;
pub use repo::{ConnRef, Connection, Repository};
pub use security::{SecurityBackend, Specification};
