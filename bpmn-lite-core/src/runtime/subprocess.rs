//! Sub-process / transaction / call-activity behavior. Entering any of
//! these pushes the node onto the
//! token's activity stack and spawns a child token rooted at the
//! container's start node; leaving it (its child token reaching one of
//! its own end events) pops the stack and resumes the parent token on
//! the container's outbound flow.

use crate::error::{EngineError, Result};
use crate::model::definition::Definition;
use crate::model::node::Node;
use crate::runtime::execution::{Execution, Token};
use crate::types::Id;

/// Enter a sub-process-like node: push it on the token's activity
/// stack and spawn a child token at its first start node.
pub fn enter(def: &Definition, exec: &mut Execution, parent_token_id: Id, container: &Node) -> Result<Id> {
    let process = def.process(&container.id).or_else(|_| {
        // CallActivity/SubProcess id is the *node* id; its nested
        // process shares the same id in this model's loader.
        def.process(&container.child_process.clone().unwrap_or_default())
    })?;
    let start_id = process
        .start_nodes
        .first()
        .cloned()
        .ok_or_else(|| EngineError::DefinitionLoad(format!("process {} has no start node", process.id)))?;

    exec.push_activity(parent_token_id, container.id.clone());
    let parent = exec
        .tokens
        .get(&parent_token_id)
        .cloned()
        .ok_or_else(|| EngineError::NotFound(format!("token {parent_token_id}")))?;
    let mut child = parent.spawn_child("");
    child.node_id = Some(start_id);
    let child_id = child.id;
    exec.tokens.insert(child_id, child);
    Ok(child_id)
}

/// Leave a sub-process-like node: pop the activity stack on the parent
/// token. The caller is responsible for advancing the parent token
/// along the container's outbound flows afterward.
pub fn leave(exec: &mut Execution, parent_token_id: Id) -> Option<String> {
    exec.pop_activity(parent_token_id)
}

pub fn child_tokens_of(exec: &Execution, parent_token_id: Id) -> Vec<&Token> {
    exec.tokens
        .values()
        .filter(|t| t.parent_token_id == Some(parent_token_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::definition::{load_definition, ParsedElement, ParsedTree};
    use crate::runtime::execution::Token;
    use crate::types::new_id;

    fn def_with_sub_process() -> Definition {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "sub1".into(), tag: "subProcess".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "inner_start".into(), tag: "startEvent".into(), process_id: "sub1".into(), ..Default::default() },
            ],
        };
        load_definition("p", "<xml/>", tree)
    }

    #[test]
    fn entering_sub_process_spawns_child_at_inner_start() {
        let def = def_with_sub_process();
        let mut exec = Execution::new(new_id(), "p");
        let parent = Token::new_root("P1");
        let parent_id = parent.id;
        exec.tokens.insert(parent_id, parent);

        let container = def.node("sub1").unwrap();
        let child_id = enter(&def, &mut exec, parent_id, container).unwrap();
        assert_eq!(exec.tokens[&child_id].node_id, Some("inner_start".to_string()));
        assert_eq!(exec.activity_stack(parent_id), &["sub1".to_string()]);
    }

    #[test]
    fn leaving_pops_activity_stack() {
        let def = def_with_sub_process();
        let mut exec = Execution::new(new_id(), "p");
        let parent = Token::new_root("P1");
        let parent_id = parent.id;
        exec.tokens.insert(parent_id, parent);
        let container = def.node("sub1").unwrap();
        enter(&def, &mut exec, parent_id, container).unwrap();

        let popped = leave(&mut exec, parent_id);
        assert_eq!(popped, Some("sub1".to_string()));
        assert!(exec.activity_stack(parent_id).is_empty());
    }
}
