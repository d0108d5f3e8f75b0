//! Runtime views of the two ends of an established connection.

use crate::attrs::{AttrValue, Attrer};
use crate::info::{PlugInfo, PlugRef, SlotInfo, SlotRef};
use std::sync::Arc;

macro_rules! connected {
    ($(#[$meta:meta])* $name:ident, $info:ident, $reference:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            info: Arc<$info>,
        }

        impl $name {
            pub fn new(info: Arc<$info>) -> Self {
                Self { info }
            }

            pub fn info(&self) -> &$info {
                &self.info
            }

            pub fn snap(&self) -> &str {
                &self.info.snap
            }

            pub fn name(&self) -> &str {
                &self.info.name
            }

            pub fn interface(&self) -> &str {
                &self.info.interface
            }

            pub fn reference(&self) -> $reference {
                self.info.reference()
            }

            pub fn security_tags(&self) -> Vec<String> {
                self.info.security_tags()
            }
        }

        impl Attrer for $name {
            fn lookup(&self, name: &str) -> Option<&AttrValue> {
                self.info.attrs.get(name)
            }
        }
    };
}

connected!(
    /// The plug side of a connection.
    ConnectedPlug,
    PlugInfo,
    PlugRef
);

connected!(
    /// The slot side of a connection.
    ConnectedSlot,
    SlotInfo,
    SlotRef
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttributeSet;

    #[test]
    fn test_connected_views_share_declaration() {
        let attrs = AttributeSet::from_pairs([("name", "/q"), ("mode", "rw")]).unwrap();
        let slot = Arc::new(SlotInfo::new("demo", "q", "msg-queue", attrs));
        let connected = ConnectedSlot::new(Arc::clone(&slot));

        assert_eq!(connected.str_attr("name").unwrap(), "/q");
        assert_eq!(connected.info().attrs.len(), 2);
        assert_eq!(connected.reference(), slot.reference());
        assert_eq!(Arc::strong_count(&slot), 2);
    }
}
