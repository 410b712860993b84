//! Boundary event behavior. An interrupting
//! boundary event (`cancel_activity = true`) cancels its host activity
//! and every token descended from it before taking its own outbound
//! flow; a non-interrupting one spawns a sibling token without
//! touching the host.

use crate::model::node::Node;
use crate::runtime::execution::{Execution, Token, TokenStatus};
use crate::types::Id;

/// Every token whose ancestry traces back to `host_token_id`, inclusive.
/// Used to cancel an interrupted activity's whole subtree: an
/// interrupting boundary event cancels its descendants too.
pub fn descendant_token_ids(exec: &Execution, host_token_id: Id) -> Vec<Id> {
    let mut out = vec![host_token_id];
    let mut frontier = vec![host_token_id];
    while let Some(cur) = frontier.pop() {
        for token in exec.tokens.values() {
            if token.parent_token_id == Some(cur) && !out.contains(&token.id) {
                out.push(token.id);
                frontier.push(token.id);
            }
        }
    }
    out
}

/// Cancel the host activity's token subtree (interrupting boundary).
/// Returns the number of tokens terminated.
pub fn cancel_subtree(exec: &mut Execution, host_token_id: Id) -> usize {
    let ids = descendant_token_ids(exec, host_token_id);
    let mut count = 0;
    for id in &ids {
        if let Some(token) = exec.tokens.get_mut(id) {
            if !matches!(token.status, TokenStatus::Ended | TokenStatus::Terminated) {
                token.status = TokenStatus::Terminated;
                count += 1;
            }
        }
    }
    count
}

/// Spawn the boundary event's own token, rooted at the host token so
/// termination bookkeeping stays consistent either way.
pub fn spawn_boundary_token(host_token: &Token, boundary: &Node) -> Token {
    let mut child = host_token.spawn_child("");
    child.node_id = Some(boundary.id.clone());
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeKind;
    use crate::types::new_id;

    #[test]
    fn descendants_include_grandchildren() {
        let mut exec = Execution::new(new_id(), "def1");
        let root = Token::new_root("P1");
        let child = root.spawn_child("a");
        let grandchild = child.spawn_child("b");
        exec.tokens.insert(root.id, root.clone());
        exec.tokens.insert(child.id, child.clone());
        exec.tokens.insert(grandchild.id, grandchild.clone());

        let ids = descendant_token_ids(&exec, root.id);
        assert!(ids.contains(&child.id));
        assert!(ids.contains(&grandchild.id));
    }

    #[test]
    fn cancel_subtree_terminates_non_terminal_tokens_only() {
        let mut exec = Execution::new(new_id(), "def1");
        let root = Token::new_root("P1");
        let mut child = root.spawn_child("a");
        child.status = TokenStatus::Ended;
        exec.tokens.insert(root.id, root.clone());
        exec.tokens.insert(child.id, child.clone());

        let cancelled = cancel_subtree(&mut exec, root.id);
        assert_eq!(cancelled, 1); // root only, child was already ended
        assert_eq!(exec.tokens[&child.id].status, TokenStatus::Ended);
        assert_eq!(exec.tokens[&root.id].status, TokenStatus::Terminated);
    }

    #[test]
    fn boundary_token_is_rooted_at_host() {
        let host = Token::new_root("P1");
        let boundary = Node::new("b1", NodeKind::BoundaryEvent, "P1");
        let spawned = spawn_boundary_token(&host, &boundary);
        assert_eq!(spawned.parent_token_id, Some(host.id));
        assert_eq!(spawned.node_id, Some("b1".to_string()));
    }
}
