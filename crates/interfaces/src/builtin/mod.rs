//! Interfaces shipped with the engine.

mod msg_queue;

pub use msg_queue::MsgQueueInterface;

use crate::interface::Interface;

/// Every built-in interface, in name order.
pub fn interfaces() -> Vec<Box<dyn Interface>> {
    vec![Box::new(MsgQueueInterface)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interfaces_contains_msg_queue() {
        let names: Vec<String> = interfaces().iter().map(|i| i.name().to_string()).collect();
        assert!(names.contains(&"msg-queue".to_string()));
    }
}
