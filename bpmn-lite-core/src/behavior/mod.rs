//! Pluggable node behaviors. Each behavior module owns one slice of
//! the lifecycle contract and is invoked by `runtime::lifecycle` at
//! the matching step; behaviors never call each other directly.

pub mod error_escalation;
pub mod form;
pub mod io;
pub mod loop_char;
pub mod message;
pub mod script;
pub mod signal;
pub mod terminate;
pub mod timer;
pub mod transaction;

use crate::external::{AppDelegate, ScriptHost};
use crate::model::node::Node;
use serde_json::Value as Json;

/// Everything a behavior needs to evaluate one lifecycle step, borrowed
/// for the duration of the call. Behaviors are pure with respect to
/// this context: they read `vars`/`node` and return an `Action` plus an
/// optional data fragment to merge, they never reach into the engine.
pub struct BehaviorContext<'a> {
    pub node: &'a Node,
    pub vars: &'a Json,
    pub script_host: &'a dyn ScriptHost,
    pub app_delegate: &'a dyn AppDelegate,
    pub now_ms: crate::types::Timestamp,
    pub iteration: Option<u32>,
}

/// A behavior's outcome: the lifecycle action plus an optional data
/// fragment to merge at the item's `data_path`.
pub struct BehaviorOutcome {
    pub action: Action,
    pub merge: Option<Json>,
}

impl BehaviorOutcome {
    pub fn continue_() -> Self {
        BehaviorOutcome { action: Action::Continue, merge: None }
    }

    pub fn wait() -> Self {
        BehaviorOutcome { action: Action::Wait, merge: None }
    }

    pub fn end() -> Self {
        BehaviorOutcome { action: Action::End, merge: None }
    }

    pub fn with_merge(action: Action, merge: Json) -> Self {
        BehaviorOutcome { action, merge: Some(merge) }
    }
}

/// Result of a lifecycle step. Ranked `Continue < Wait < End < Error < Abort` so that a
/// hard stop from one behavior can never be silently overridden by a
/// more permissive one that ran later.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Continue,
    Wait,
    End,
    Error(String),
    Abort(String),
}

impl Action {
    fn rank(&self) -> u8 {
        match self {
            Action::Continue => 0,
            Action::Wait => 1,
            Action::End => 2,
            Action::Error(_) => 3,
            Action::Abort(_) => 4,
        }
    }
}

/// Combine two behavior outcomes by taking the higher-ranked one.
/// Ties prefer the earlier (left) outcome so that the
/// first behavior to report a given rank determines its payload.
pub fn max_action(a: Action, b: Action) -> Action {
    if b.rank() > a.rank() {
        b
    } else {
        a
    }
}

pub fn fold_actions(actions: impl IntoIterator<Item = Action>) -> Action {
    actions
        .into_iter()
        .fold(Action::Continue, |acc, next| max_action(acc, next))
}

/// Closed tagged union over the extension behaviors a `Node` can carry.
/// Built once at load time from the node's fields rather
/// than probed per-call with `hasattr`/duck typing.
#[derive(Clone, Debug)]
pub enum BehaviorSlot {
    Timer,
    Message,
    Signal,
    Error,
    Escalation,
    Cancel,
    Compensate,
    Terminate,
    IoMapping,
    Loop,
    Form,
    Script,
}

/// The set of behavior slots attached to a node, derived from its
/// static fields. Order matters: it is the fixed evaluation order a
/// lifecycle step runs behaviors in.
pub fn slots_for(node: &Node) -> Vec<BehaviorSlot> {
    let mut slots = Vec::new();
    if node.timer_spec.is_some() {
        slots.push(BehaviorSlot::Timer);
    }
    if node.message_id.is_some() {
        slots.push(BehaviorSlot::Message);
    }
    if node.signal_id.is_some() {
        slots.push(BehaviorSlot::Signal);
    }
    if node.error_code.is_some() {
        slots.push(BehaviorSlot::Error);
    }
    if node.escalation_code.is_some() {
        slots.push(BehaviorSlot::Escalation);
    }
    if matches!(
        node.sub_type,
        Some(crate::model::node::EventSubType::Cancel)
    ) {
        slots.push(BehaviorSlot::Cancel);
    }
    if matches!(
        node.sub_type,
        Some(crate::model::node::EventSubType::Compensate)
    ) {
        slots.push(BehaviorSlot::Compensate);
    }
    if matches!(
        node.sub_type,
        Some(crate::model::node::EventSubType::Terminate)
    ) {
        slots.push(BehaviorSlot::Terminate);
    }
    if node.io_spec.is_some() {
        slots.push(BehaviorSlot::IoMapping);
    }
    if node.loop_characteristics.is_some() {
        slots.push(BehaviorSlot::Loop);
    }
    if node.form_spec.is_some() {
        slots.push(BehaviorSlot::Form);
    }
    if node.scripts.contains_key("start") || node.scripts.contains_key("validate") {
        slots.push(BehaviorSlot::Script);
    }
    slots
}

/// Evaluate a boolean gateway condition expression against the current
/// data tree. Scripting is an external collaborator; this
/// fallback only understands the trivial `"true"`/`"false"` literals
/// and empty (always-true, i.e. the default flow) expressions so unit
/// tests can exercise gateway routing without a real script host.
pub fn eval_condition_literal(expr: Option<&str>, _data: &Json) -> bool {
    match expr.map(str::trim) {
        None | Some("") => true,
        Some("true") => true,
        Some("false") => false,
        Some(_) => false,
    }
}
