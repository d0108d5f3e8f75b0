//! Rule actions, scopes and sides.

use std::fmt;

/// Whether a rule grants or vetoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Allow,
    Deny,
}

/// What a rule governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Installation,
    Connection,
    AutoConnection,
}

/// Which section of the base declaration a rule lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Plug,
    Slot,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Installation => "installation",
            Scope::Connection => "connection",
            Scope::AutoConnection => "auto-connection",
        }
    }

    /// Outcome when no rule on either side speaks to this scope.
    ///
    /// Auto-connection needs an explicit grant; manual connection and
    /// installation are allowed unless a rule says otherwise.
    pub fn allowed_by_default(&self) -> bool {
        !matches!(self, Scope::AutoConnection)
    }

    /// Parse a rule key such as `deny-auto-connection`.
    pub fn parse_rule_key(key: &str) -> Option<(Action, Scope)> {
        let (action, scope) = if let Some(rest) = key.strip_prefix("allow-") {
            (Action::Allow, rest)
        } else if let Some(rest) = key.strip_prefix("deny-") {
            (Action::Deny, rest)
        } else {
            return None;
        };
        let scope = match scope {
            "installation" => Scope::Installation,
            "connection" => Scope::Connection,
            "auto-connection" => Scope::AutoConnection,
            _ => return None,
        };
        Some((action, scope))
    }
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Plug => "plug",
            Side::Slot => "slot",
        }
    }

    pub fn counterpart(&self) -> Side {
        match self {
            Side::Plug => Side::Slot,
            Side::Slot => Side::Plug,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rule_key() {
        assert_eq!(
            Scope::parse_rule_key("allow-installation"),
            Some((Action::Allow, Scope::Installation))
        );
        assert_eq!(
            Scope::parse_rule_key("deny-auto-connection"),
            Some((Action::Deny, Scope::AutoConnection))
        );
        assert_eq!(Scope::parse_rule_key("allow-everything"), None);
        assert_eq!(Scope::parse_rule_key("connection"), None);
    }

    #[test]
    fn test_defaults() {
        assert!(!Scope::AutoConnection.allowed_by_default());
        assert!(Scope::Connection.allowed_by_default());
        assert!(Scope::Installation.allowed_by_default());
    }
}
