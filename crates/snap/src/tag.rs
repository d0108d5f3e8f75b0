//! Security tag derivation.
//!
//! A security tag names the confined process a policy snippet applies to.
//! Tags are always derived from names and never stored on their own.

/// Tag of an app: `snap.<snap>.<app>`.
pub fn app_security_tag(snap: &str, app: &str) -> String {
    format!("snap.{snap}.{app}")
}

/// Tag of a hook: `snap.<snap>.hook.<hook>`.
pub fn hook_security_tag(snap: &str, hook: &str) -> String {
    format!("snap.{snap}.hook.{hook}")
}
