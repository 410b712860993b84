//! Terminate end event behavior: reaching one
//! immediately ends the enclosing process instance, discarding every
//! other live token in that instance without running their own end
//! behaviors. The actual token sweep lives in `runtime::termination`;
//! this module only recognizes the node shape.

use crate::model::node::{EventSubType, Node, NodeKind};

pub fn is_terminate(node: &Node) -> bool {
    matches!(node.kind, NodeKind::EndEvent) && matches!(node.sub_type, Some(EventSubType::Terminate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_terminate_end_event() {
        let mut node = Node::new("term", NodeKind::EndEvent, "P1");
        node.sub_type = Some(EventSubType::Terminate);
        assert!(is_terminate(&node));
    }

    #[test]
    fn ordinary_end_event_is_not_terminate() {
        let node = Node::new("end", NodeKind::EndEvent, "P1");
        assert!(!is_terminate(&node));
    }
}
