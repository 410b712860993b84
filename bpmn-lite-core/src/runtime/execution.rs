//! Execution/Token/Item/Loop entities. Arena-style storage
//! keyed by `Id` rather than the cyclic GC back-pointers (`parent`,
//! `origin_item`) a managed-runtime version of this model would use —
//! every cross-reference here is a plain `Id` looked up in one of
//! `Execution`'s maps.

use crate::events::{EventRecord, RuntimeEvent};
use crate::model::node::ElementId;
use crate::types::{new_id, now_ms, CorrelationKey, DataValue, Id, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
    Active,
    Waiting,
    Ended,
    Terminated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub id: Id,
    pub process_id: String,
    pub node_id: Option<ElementId>,
    pub data_path: String,
    pub parent_token_id: Option<Id>,
    pub status: TokenStatus,
    pub origin_item_id: Option<Id>,
    pub created_at: Timestamp,
}

impl Token {
    pub fn new_root(process_id: impl Into<String>) -> Self {
        Token {
            id: new_id(),
            process_id: process_id.into(),
            node_id: None,
            data_path: String::new(),
            parent_token_id: None,
            status: TokenStatus::Active,
            origin_item_id: None,
            created_at: now_ms(),
        }
    }

    pub fn spawn_child(&self, data_path_suffix: &str) -> Self {
        Token {
            id: new_id(),
            process_id: self.process_id.clone(),
            node_id: None,
            data_path: crate::data_path::qualify(&self.data_path, data_path_suffix),
            parent_token_id: Some(self.id),
            status: TokenStatus::Active,
            origin_item_id: None,
            created_at: now_ms(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Entered,
    Assigned,
    Validated,
    Started,
    Waiting,
    Ended,
    Terminated,
    Errored,
}

/// One visit of a token to a node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: Id,
    pub token_id: Id,
    pub element_id: ElementId,
    pub status: ItemStatus,
    pub correlation_key: CorrelationKey,
    pub created_at: Timestamp,
    pub ended_at: Option<Timestamp>,
}

impl Item {
    pub fn new(token_id: Id, element_id: impl Into<ElementId>) -> Self {
        Item {
            id: new_id(),
            token_id,
            element_id: element_id.into(),
            status: ItemStatus::Entered,
            correlation_key: CorrelationKey::none(),
            created_at: now_ms(),
            ended_at: None,
        }
    }
}

/// One multi-instance/standard loop bookkeeping record. Keyed by the *owning item's* id, not embedded in it —
/// another arena-style indirection instead of a back-pointer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoopInstance {
    pub id: Id,
    pub owner_item_id: Id,
    pub total: u32,
    pub completed: u32,
    pub iteration: u32,
    pub child_token_ids: Vec<Id>,
    pub is_parallel: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Running,
    Waiting,
    Ended,
    Terminated,
}

/// One running process instance. Owns every
/// Token/Item/Loop it contains; nothing here borrows from the
/// `Definition`, which is shared read-only via `Arc`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    pub instance_id: Id,
    pub definition_key: String,
    pub data: DataValue,
    pub tokens: BTreeMap<Id, Token>,
    pub items: BTreeMap<Id, Item>,
    pub loops: BTreeMap<Id, LoopInstance>,
    /// Stack of currently-entered sub-process/transaction node ids per
    /// token, used by error/escalation propagation and boundary event
    /// matching.
    pub activity_stacks: BTreeMap<Id, Vec<ElementId>>,
    pub status: InstanceStatus,
    pub event_log: Vec<EventRecord>,
    pub created_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    seq: u64,
}

impl Execution {
    pub fn new(instance_id: Id, definition_key: impl Into<String>) -> Self {
        Execution {
            instance_id,
            definition_key: definition_key.into(),
            data: DataValue::Object(Default::default()),
            tokens: BTreeMap::new(),
            items: BTreeMap::new(),
            loops: BTreeMap::new(),
            activity_stacks: BTreeMap::new(),
            status: InstanceStatus::Running,
            event_log: Vec::new(),
            created_at: now_ms(),
            ended_at: None,
            seq: 0,
        }
    }

    pub fn emit(&mut self, event: RuntimeEvent) {
        self.seq += 1;
        self.event_log.push(EventRecord {
            seq: self.seq,
            at: now_ms(),
            event,
            details: DataValue::Null,
        });
    }

    pub fn vars_for(&self, token_id: Id) -> DataValue {
        let token = &self.tokens[&token_id];
        crate::data_path::project_vars(&self.data, &token.data_path)
    }

    pub fn merge_at(&mut self, token_id: Id, key: &str, value: DataValue) {
        let path = {
            let token = &self.tokens[&token_id];
            crate::data_path::qualify(&token.data_path, key)
        };
        crate::data_path::merge(&mut self.data, &path, value);
    }

    /// Active (non-ended, non-terminated) tokens, in creation order.
    pub fn active_tokens(&self) -> Vec<&Token> {
        let mut out: Vec<&Token> = self
            .tokens
            .values()
            .filter(|t| matches!(t.status, TokenStatus::Active | TokenStatus::Waiting))
            .collect();
        out.sort_by_key(|t| t.created_at);
        out
    }

    pub fn is_converged_complete(&self) -> bool {
        self.tokens
            .values()
            .all(|t| matches!(t.status, TokenStatus::Ended | TokenStatus::Terminated))
    }

    pub fn push_activity(&mut self, token_id: Id, node_id: ElementId) {
        self.activity_stacks.entry(token_id).or_default().push(node_id);
    }

    pub fn pop_activity(&mut self, token_id: Id) -> Option<ElementId> {
        self.activity_stacks.get_mut(&token_id).and_then(|s| s.pop())
    }

    pub fn activity_stack(&self, token_id: Id) -> &[ElementId] {
        self.activity_stacks
            .get(&token_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_token_inherits_qualified_data_path() {
        let mut root = Token::new_root("P1");
        root.data_path = "orders.0".into();
        let child = root.spawn_child("lineItems.2");
        assert_eq!(child.data_path, "orders.0.lineItems.2");
        assert_eq!(child.parent_token_id, Some(root.id));
    }

    #[test]
    fn merge_at_is_scoped_by_token_data_path() {
        let mut exec = Execution::new(new_id(), "def1");
        let mut token = Token::new_root("P1");
        token.data_path = "scope".into();
        let token_id = token.id;
        exec.tokens.insert(token_id, token);
        exec.merge_at(token_id, "x", serde_json::json!(1));
        assert_eq!(exec.data["scope"]["x"], serde_json::json!(1));
    }

    #[test]
    fn converged_complete_requires_all_tokens_terminal() {
        let mut exec = Execution::new(new_id(), "def1");
        let t1 = Token::new_root("P1");
        let mut t2 = Token::new_root("P1");
        t2.status = TokenStatus::Ended;
        exec.tokens.insert(t1.id, t1);
        exec.tokens.insert(t2.id, t2);
        assert!(!exec.is_converged_complete());
    }
}
