use crate::types::ElementId;
use serde::{Deserialize, Serialize};

/// The BPMN event-definition subtype a catch/throw event or boundary
/// event carries, as a closed enum instead of a string tag so the
/// lifecycle code can match exhaustively over element types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSubType {
    Timer,
    Message,
    Signal,
    Error,
    Escalation,
    Cancel,
    Compensate,
    Conditional,
    Terminate,
}

/// Closed tagged union over the node taxonomy. Gateways,
/// tasks, sub-processes, and events are each their own variant (rather
/// than one `Node` struct with a string `type` field and optional
/// extension slots matched by `hasattr`), so the lifecycle code is
/// exhaustively checked against this list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    StartEvent,
    EndEvent,
    IntermediateCatchEvent,
    IntermediateThrowEvent,
    BoundaryEvent,
    UserTask,
    ServiceTask,
    ScriptTask,
    SendTask,
    ReceiveTask,
    BusinessRuleTask,
    ManualTask,
    CallActivity { called_process_key: String },
    SubProcess,
    AdHocSubProcess,
    Transaction,
    ExclusiveGateway,
    InclusiveGateway,
    ParallelGateway,
    EventBasedGateway,
}

impl NodeKind {
    /// Whether this node kind parks the token until an external event
    /// (invoke, message, signal, timer) arrives before it can end.
    pub fn requires_wait(&self) -> bool {
        matches!(
            self,
            NodeKind::UserTask
                | NodeKind::ReceiveTask
                | NodeKind::IntermediateCatchEvent
                | NodeKind::StartEvent
                | NodeKind::BoundaryEvent
                | NodeKind::SubProcess
                | NodeKind::AdHocSubProcess
                | NodeKind::Transaction
                | NodeKind::CallActivity { .. }
        )
    }

    /// StartEvent is only externally invokable when
    /// it is a secondary start (event sub-process / message start) — the
    /// primary start is driven by `engine.start`, not a signal.
    pub fn can_be_invoked(&self) -> bool {
        matches!(
            self,
            NodeKind::UserTask
                | NodeKind::ReceiveTask
                | NodeKind::IntermediateCatchEvent
                | NodeKind::StartEvent
                | NodeKind::BoundaryEvent
        )
    }

    pub fn is_catching(&self) -> bool {
        matches!(
            self,
            NodeKind::UserTask
                | NodeKind::ReceiveTask
                | NodeKind::IntermediateCatchEvent
                | NodeKind::StartEvent
                | NodeKind::BoundaryEvent
        )
    }

    pub fn is_gateway(&self) -> bool {
        matches!(
            self,
            NodeKind::ExclusiveGateway
                | NodeKind::InclusiveGateway
                | NodeKind::ParallelGateway
                | NodeKind::EventBasedGateway
        )
    }

    pub fn is_converging_capable(&self) -> bool {
        matches!(
            self,
            NodeKind::ExclusiveGateway | NodeKind::InclusiveGateway | NodeKind::ParallelGateway
        )
    }

    pub fn is_sub_process_like(&self) -> bool {
        matches!(
            self,
            NodeKind::SubProcess
                | NodeKind::AdHocSubProcess
                | NodeKind::Transaction
                | NodeKind::CallActivity { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::StartEvent => "StartEvent",
            NodeKind::EndEvent => "EndEvent",
            NodeKind::IntermediateCatchEvent => "IntermediateCatchEvent",
            NodeKind::IntermediateThrowEvent => "IntermediateThrowEvent",
            NodeKind::BoundaryEvent => "BoundaryEvent",
            NodeKind::UserTask => "UserTask",
            NodeKind::ServiceTask => "ServiceTask",
            NodeKind::ScriptTask => "ScriptTask",
            NodeKind::SendTask => "SendTask",
            NodeKind::ReceiveTask => "ReceiveTask",
            NodeKind::BusinessRuleTask => "BusinessRuleTask",
            NodeKind::ManualTask => "ManualTask",
            NodeKind::CallActivity { .. } => "CallActivity",
            NodeKind::SubProcess => "SubProcess",
            NodeKind::AdHocSubProcess => "AdHocSubProcess",
            NodeKind::Transaction => "Transaction",
            NodeKind::ExclusiveGateway => "ExclusiveGateway",
            NodeKind::InclusiveGateway => "InclusiveGateway",
            NodeKind::ParallelGateway => "ParallelGateway",
            NodeKind::EventBasedGateway => "EventBasedGateway",
        }
    }
}

/// Multi-instance / standard loop characteristics attached to an
/// activity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum LoopCharacteristics {
    SequentialMultiInstance { collection_path: String, element_var: String },
    ParallelMultiInstance { collection_path: String, element_var: String },
    StandardLoop { condition_script: String, max_iterations: u32 },
}

/// One input or output parameter mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IoParameter {
    pub name: String,
    pub source: IoSource,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum IoSource {
    Literal(serde_json::Value),
    Expression(String),
    Script(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct IoSpec {
    pub inputs: Vec<IoParameter>,
    pub outputs: Vec<IoParameter>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    pub label: String,
    pub field_type: String,
    pub default_expression: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct FormSpec {
    pub fields: Vec<FormField>,
}

/// Timer specification : a duration, a cycle,
/// or an absolute date — each is an ISO-8601 expression resolved by
/// `scheduler::resolve_timer_spec`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TimerSpec {
    Duration(String),
    Cycle(String),
    Date(String),
}

/// One BPMN element.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: ElementId,
    pub name: Option<String>,
    pub kind: NodeKind,
    pub sub_type: Option<EventSubType>,
    pub process_id: String,
    pub inbounds: Vec<String>,
    pub outbounds: Vec<String>,
    pub attachments: Vec<ElementId>,
    pub attached_to: Option<ElementId>,
    pub cancel_activity: bool,
    pub lane: Option<String>,
    pub message_id: Option<String>,
    pub signal_id: Option<String>,
    pub error_code: Option<String>,
    pub escalation_code: Option<String>,
    pub timer_spec: Option<TimerSpec>,
    pub scripts: std::collections::BTreeMap<String, Vec<String>>,
    pub io_spec: Option<IoSpec>,
    pub loop_characteristics: Option<LoopCharacteristics>,
    pub form_spec: Option<FormSpec>,
    pub child_process: Option<String>,
    pub correlation_key_expr: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<ElementId>, kind: NodeKind, process_id: impl Into<String>) -> Self {
        Node {
            id: id.into(),
            name: None,
            kind,
            sub_type: None,
            process_id: process_id.into(),
            inbounds: Vec::new(),
            outbounds: Vec::new(),
            attachments: Vec::new(),
            attached_to: None,
            cancel_activity: true,
            lane: None,
            message_id: None,
            signal_id: None,
            error_code: None,
            escalation_code: None,
            timer_spec: None,
            scripts: std::collections::BTreeMap::new(),
            io_spec: None,
            loop_characteristics: None,
            form_spec: None,
            child_process: None,
            correlation_key_expr: None,
        }
    }

    pub fn requires_wait(&self) -> bool {
        self.kind.requires_wait()
    }

    pub fn can_be_invoked(&self) -> bool {
        self.kind.can_be_invoked()
    }

    pub fn is_catching(&self) -> bool {
        self.kind.is_catching()
    }
}

/// Sequence or message flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub source: ElementId,
    pub target: ElementId,
    pub condition_expr: Option<String>,
    pub is_default: bool,
    pub kind: FlowKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    Sequence,
    Message,
}
