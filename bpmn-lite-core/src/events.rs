use crate::types::{DataValue, ElementId, Id, Timestamp};
use serde::{Deserialize, Serialize};

/// The fixed event-name list emitted by the runtime. Every `RuntimeEvent` variant
/// maps to exactly one of these strings via `RuntimeEvent::name()`; every
/// emission is additionally re-emitted under `"all"` by the listener
/// registry (see `runtime::execution::Execution::emit`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RuntimeEvent {
    NodeEnter { element_id: ElementId, item_id: Id },
    NodeAssign { element_id: ElementId, item_id: Id },
    NodeValidate { element_id: ElementId, item_id: Id, errors: Vec<String> },
    NodeStart { element_id: ElementId, item_id: Id },
    NodeWait { element_id: ElementId, item_id: Id },
    NodeEnd { element_id: ElementId, item_id: Id, cancel: bool },
    NodeTerminated { element_id: ElementId, item_id: Id },
    TransformInput { element_id: ElementId, item_id: Id },
    TransformOutput { element_id: ElementId, item_id: Id },
    FlowTake { flow_id: String, from: ElementId, to: ElementId },
    FlowDiscard { flow_id: String, from: ElementId, to: ElementId },
    ProcessLoaded { definition_key: String },
    ProcessStart { instance_id: Id },
    ProcessStarted { instance_id: Id },
    ProcessInvoke { instance_id: Id, item_id: Id },
    ProcessInvoked { instance_id: Id, item_id: Id },
    ProcessSaving { instance_id: Id },
    ProcessRestored { instance_id: Id },
    ProcessResumed { instance_id: Id },
    ProcessWait { instance_id: Id },
    ProcessEnd { instance_id: Id, at: Timestamp },
    ProcessTerminated { instance_id: Id, at: Timestamp },
    ProcessException { instance_id: Id, message: String },
    TokenStart { token_id: Id, start_node_id: ElementId },
    TokenWait { token_id: Id },
    TokenEnd { token_id: Id },
    TokenTerminated { token_id: Id },
    ProcessError { instance_id: Id, code: String, handled: bool },
}

impl RuntimeEvent {
    /// The fixed string name for this event. `"all"` is handled by the
    /// listener registry, not stored as a variant.
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeEvent::NodeEnter { .. } => "node_enter",
            RuntimeEvent::NodeAssign { .. } => "node_assign",
            RuntimeEvent::NodeValidate { .. } => "node_validate",
            RuntimeEvent::NodeStart { .. } => "node_start",
            RuntimeEvent::NodeWait { .. } => "node_wait",
            RuntimeEvent::NodeEnd { .. } => "node_end",
            RuntimeEvent::NodeTerminated { .. } => "node_terminated",
            RuntimeEvent::TransformInput { .. } => "transform_input",
            RuntimeEvent::TransformOutput { .. } => "transform_output",
            RuntimeEvent::FlowTake { .. } => "flow_take",
            RuntimeEvent::FlowDiscard { .. } => "flow_discard",
            RuntimeEvent::ProcessLoaded { .. } => "process_loaded",
            RuntimeEvent::ProcessStart { .. } => "process_start",
            RuntimeEvent::ProcessStarted { .. } => "process_started",
            RuntimeEvent::ProcessInvoke { .. } => "process_invoke",
            RuntimeEvent::ProcessInvoked { .. } => "process_invoked",
            RuntimeEvent::ProcessSaving { .. } => "process_saving",
            RuntimeEvent::ProcessRestored { .. } => "process_restored",
            RuntimeEvent::ProcessResumed { .. } => "process_resumed",
            RuntimeEvent::ProcessWait { .. } => "process_wait",
            RuntimeEvent::ProcessEnd { .. } => "process_end",
            RuntimeEvent::ProcessTerminated { .. } => "process_terminated",
            RuntimeEvent::ProcessException { .. } => "process_exception",
            RuntimeEvent::TokenStart { .. } => "token_start",
            RuntimeEvent::TokenWait { .. } => "token_wait",
            RuntimeEvent::TokenEnd { .. } => "token_end",
            RuntimeEvent::TokenTerminated { .. } => "token_terminated",
            RuntimeEvent::ProcessError { .. } => "process_error",
        }
    }
}

/// One recorded emission, as it lands in an Execution's transient log and
/// (optionally) the store's append-only event history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub at: Timestamp,
    pub event: RuntimeEvent,
    pub details: DataValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_spec_strings() {
        let e = RuntimeEvent::NodeEnter {
            element_id: "a".into(),
            item_id: crate::types::new_id(),
        };
        assert_eq!(e.name(), "node_enter");
    }
}
