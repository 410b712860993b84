//! Error/escalation classification.
//! This module only answers "does this end event throw, and does that
//! boundary event catch it" — the tree walk that finds the nearest
//! matching boundary/event-sub-process lives in
//! `runtime::errorprop` since it needs the execution's activity stack.

use crate::model::node::{EventSubType, Node, NodeKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Thrown {
    Error,
    Escalation,
}

/// An end event (or error/escalation throw event) with `error_code` or
/// `escalation_code` set throws on completion.
pub fn thrown_by(node: &Node) -> Option<(Thrown, String)> {
    if matches!(node.kind, NodeKind::EndEvent | NodeKind::IntermediateThrowEvent) {
        if let Some(code) = &node.error_code {
            return Some((Thrown::Error, code.clone()));
        }
        if let Some(code) = &node.escalation_code {
            return Some((Thrown::Escalation, code.clone()));
        }
    }
    None
}

/// A boundary event (or event sub-process start) catches a thrown
/// error/escalation if its sub_type matches and its own code is empty
/// (catch-all) or equal to the thrown code.
pub fn catches(node: &Node, thrown: Thrown, code: &str) -> bool {
    let is_right_kind = matches!(node.kind, NodeKind::BoundaryEvent | NodeKind::StartEvent);
    if !is_right_kind {
        return false;
    }
    match thrown {
        Thrown::Error => {
            matches!(node.sub_type, Some(EventSubType::Error))
                && node
                    .error_code
                    .as_deref()
                    .map(|c| c.is_empty() || c == code)
                    .unwrap_or(true)
        }
        Thrown::Escalation => {
            matches!(node.sub_type, Some(EventSubType::Escalation))
                && node
                    .escalation_code
                    .as_deref()
                    .map(|c| c.is_empty() || c == code)
                    .unwrap_or(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::Node;

    #[test]
    fn end_event_with_error_code_throws() {
        let mut node = Node::new("e1", NodeKind::EndEvent, "P1");
        node.error_code = Some("INSUFFICIENT_FUNDS".into());
        assert_eq!(thrown_by(&node), Some((Thrown::Error, "INSUFFICIENT_FUNDS".into())));
    }

    #[test]
    fn catch_all_boundary_matches_any_code() {
        let mut boundary = Node::new("b1", NodeKind::BoundaryEvent, "P1");
        boundary.sub_type = Some(EventSubType::Error);
        boundary.error_code = Some(String::new());
        assert!(catches(&boundary, Thrown::Error, "ANY_CODE"));
    }

    #[test]
    fn specific_boundary_rejects_other_codes() {
        let mut boundary = Node::new("b2", NodeKind::BoundaryEvent, "P1");
        boundary.sub_type = Some(EventSubType::Error);
        boundary.error_code = Some("TIMEOUT".into());
        assert!(!catches(&boundary, Thrown::Error, "OTHER"));
        assert!(catches(&boundary, Thrown::Error, "TIMEOUT"));
    }
}
