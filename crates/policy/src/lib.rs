//! Base declaration rules for snap interfaces.
//!
//! Core principle: **an explicit deny always wins, and nothing is
//! auto-connected without an explicit grant.**
//!
//! Every interface ships rule text for its plug side and slot side. The
//! text is parsed once into a [`RuleSet`] per side and evaluated against a
//! plug, a slot, or a plug/slot pair for one of three [`Scope`]s:
//! installation, connection and auto-connection.
//!
//! # Example
//!
//! ```
//! use policy::BaseDeclaration;
//! use snap::{AttributeSet, PlugInfo, SlotInfo};
//!
//! let mut decl = BaseDeclaration::new();
//! decl.add_interface("msg-queue", "", r#"
//! msg-queue:
//!   allow-auto-connection:
//!     plug-attributes:
//!       name: $SLOT(name)
//! "#)?;
//!
//! let attrs = AttributeSet::from_pairs([("name", "/q")]).unwrap();
//! let plug = PlugInfo::new("consumer", "q", "msg-queue", attrs.clone());
//! let slot = SlotInfo::new("provider", "q", "msg-queue", attrs);
//! assert!(decl.check_auto_connection(&plug, &slot).is_allowed());
//! # Ok::<(), policy::Error>(())
//! ```

mod constraint;
mod declaration;
mod error;
mod rule;
mod scope;

pub use constraint::{AttrConstraint, AttrConstraints, Pattern, Reference, Resolved, Unresolved};
pub use declaration::{BaseDeclaration, Verdict};
pub use error::{Error, Result};
pub use rule::{ConstraintSet, Rule, RuleBody, RuleSet, SideVerdict, Subject};
pub use scope::{Action, Scope, Side};
