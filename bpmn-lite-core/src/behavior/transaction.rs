//! Transaction sub-process behavior: a
//! `Transaction` completes either normally, via a cancel boundary event
//! (which runs attached compensation handlers in reverse completion
//! order before propagating the cancellation), or via a hazard that
//! aborts the whole instance. The compensation walk itself lives in
//! `runtime::boundary`; this module classifies the node shapes.

use crate::model::node::{EventSubType, Node, NodeKind};

pub fn is_transaction(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Transaction)
}

pub fn is_cancel_boundary(node: &Node) -> bool {
    matches!(node.kind, NodeKind::BoundaryEvent) && matches!(node.sub_type, Some(EventSubType::Cancel))
}

pub fn is_compensation_boundary(node: &Node) -> bool {
    matches!(node.kind, NodeKind::BoundaryEvent)
        && matches!(node.sub_type, Some(EventSubType::Compensate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transaction_node() {
        let node = Node::new("t1", NodeKind::Transaction, "P1");
        assert!(is_transaction(&node));
    }

    #[test]
    fn classifies_cancel_boundary() {
        let mut node = Node::new("cb1", NodeKind::BoundaryEvent, "P1");
        node.sub_type = Some(EventSubType::Cancel);
        assert!(is_cancel_boundary(&node));
        assert!(!is_compensation_boundary(&node));
    }
}
