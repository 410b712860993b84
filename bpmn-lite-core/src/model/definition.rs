use super::node::{Flow, Node};
use crate::error::{EngineError, Result};
use crate::types::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// One BPMN `<process>`/`<subProcess>`/`<transaction>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Process {
    pub id: String,
    pub name: Option<String>,
    pub is_root: bool,
    pub triggered_by_event: bool,
    pub children_nodes: Vec<String>,
    pub start_nodes: Vec<String>,
    /// Child processes whose root start event is `triggered_by_event`.
    pub event_sub_processes: Vec<String>,
    pub candidate_starters: Vec<String>,
}

/// Immutable, shared, cross-linked model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Definition {
    pub key: String,
    pub source_xml: String,
    pub definition_hash: [u8; 32],
    pub root_process_id: String,
    pub processes: BTreeMap<String, Process>,
    pub nodes: BTreeMap<String, Node>,
    pub flows: Vec<Flow>,
    pub access_rules: Vec<String>,
}

impl Definition {
    pub fn node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("node {id}")))
    }

    pub fn process(&self, id: &str) -> Result<&Process> {
        self.processes
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("process {id}")))
    }

    pub fn root_process(&self) -> &Process {
        &self.processes[&self.root_process_id]
    }

    pub fn flow(&self, id: &str) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == id)
    }

    /// Outbound sequence flows of a node, in declaration order.
    pub fn outbound_flows(&self, node_id: &str) -> Vec<&Flow> {
        self.nodes
            .get(node_id)
            .map(|n| {
                n.outbounds
                    .iter()
                    .filter_map(|fid| self.flow(fid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True if `from` can reach `to` by following sequence-flow outbounds
    /// forward through the graph (ignores message flows). Used by gateway
    /// convergence to find "related tokens".
    pub fn can_reach(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![from.to_string()];
        while let Some(cur) = stack.pop() {
            if cur == to {
                return true;
            }
            if !seen.insert(cur.clone()) {
                continue;
            }
            for flow in self.outbound_flows(&cur) {
                if flow.kind == super::node::FlowKind::Sequence {
                    stack.push(flow.target.clone());
                }
            }
        }
        false
    }
}

/// The DTO shape the external BPMN parser produces. The loader only
/// ever sees this tree, never raw XML — parsing itself is out of scope
/// for the core.
#[derive(Clone, Debug, Default)]
pub struct ParsedElement {
    pub id: String,
    pub name: Option<String>,
    pub tag: String,
    pub process_id: String,
    pub attached_to_ref: Option<String>,
    pub cancel_activity: bool,
    pub source_ref: Option<String>,
    pub target_ref: Option<String>,
    pub condition_expr: Option<String>,
    pub is_default: bool,
    pub event_definition: Option<String>, // "timer" | "message" | "signal" | "error" | "escalation" | "conditional" | "terminate" | "compensate" | "cancel"
    pub message_id: Option<String>,
    pub signal_id: Option<String>,
    pub error_code: Option<String>,
    pub escalation_code: Option<String>,
    pub timer_duration: Option<String>,
    pub timer_cycle: Option<String>,
    pub timer_date: Option<String>,
    pub called_process_key: Option<String>,
    pub lane: Option<String>,
    pub triggered_by_event: bool,
    pub loop_multi_instance: Option<(bool, String, String)>, // (is_parallel, collection_path, element_var)
    pub loop_standard: Option<(String, u32)>,                // (condition, max_iterations)
}

#[derive(Clone, Debug, Default)]
pub struct ParsedTree {
    pub process_name: String,
    pub root_process_id: String,
    pub elements: Vec<ParsedElement>,
}

/// Trait boundary for the external BPMN XML parser. The core
/// only consumes `parse() -> ParsedTree`; the XML grammar itself is an
/// external collaborator.
pub trait BpmnParser: Send + Sync {
    fn parse(&self, xml_source: &str) -> Result<ParsedTree>;
}

/// Definition loader & node graph. Materializes a
/// `ParsedTree` into a fully cross-linked `Definition`.
pub fn load_definition(process_name: &str, source_xml: &str, tree: ParsedTree) -> Definition {
    let mut processes: BTreeMap<String, Process> = BTreeMap::new();
    let mut nodes: BTreeMap<String, crate::model::node::Node> = BTreeMap::new();
    let mut flows: Vec<Flow> = Vec::new();

    for el in &tree.elements {
        processes.entry(el.process_id.clone()).or_insert_with(|| Process {
            id: el.process_id.clone(),
            name: None,
            is_root: el.process_id == tree.root_process_id,
            triggered_by_event: false,
            children_nodes: Vec::new(),
            start_nodes: Vec::new(),
            event_sub_processes: Vec::new(),
            candidate_starters: Vec::new(),
        });
    }

    for el in &tree.elements {
        if el.tag == "sequenceFlow" || el.tag == "messageFlow" {
            let (Some(source), Some(target)) = (el.source_ref.clone(), el.target_ref.clone())
            else {
                warn!(flow_id = %el.id, "flow missing source/target ref, skipping");
                continue;
            };
            flows.push(Flow {
                id: el.id.clone(),
                source,
                target,
                condition_expr: el.condition_expr.clone(),
                is_default: el.is_default,
                kind: if el.tag == "messageFlow" {
                    super::node::FlowKind::Message
                } else {
                    super::node::FlowKind::Sequence
                },
            });
            continue;
        }

        let Some(kind) = classify(el) else {
            warn!(tag = %el.tag, id = %el.id, "unrecognized element tag, skipping");
            continue;
        };

        let mut node = crate::model::node::Node::new(el.id.clone(), kind, el.process_id.clone());
        node.name = el.name.clone();
        node.lane = el.lane.clone();
        node.attached_to = el.attached_to_ref.clone();
        node.cancel_activity = el.cancel_activity;
        node.message_id = el.message_id.clone();
        node.signal_id = el.signal_id.clone();
        node.error_code = el.error_code.clone();
        node.escalation_code = el.escalation_code.clone();
        node.child_process = el.called_process_key.clone();
        node.sub_type = classify_sub_type(el);
        node.timer_spec = classify_timer(el);
        node.loop_characteristics = classify_loop(el);

        if let Some(proc) = processes.get_mut(&el.process_id) {
            proc.children_nodes.push(node.id.clone());
            if matches!(node.kind, crate::model::node::NodeKind::StartEvent) {
                proc.start_nodes.push(node.id.clone());
            }
            if el.triggered_by_event {
                proc.triggered_by_event = true;
            }
        }

        nodes.insert(node.id.clone(), node);
    }

    // Cross-link sequence/message flows into inbounds/outbounds.
    for flow in &flows {
        if let Some(src) = nodes.get_mut(&flow.source) {
            src.outbounds.push(flow.id.clone());
        } else {
            warn!(flow_id = %flow.id, source = %flow.source, "flow references unknown source node");
        }
        if let Some(tgt) = nodes.get_mut(&flow.target) {
            tgt.inbounds.push(flow.id.clone());
        } else {
            warn!(flow_id = %flow.id, target = %flow.target, "flow references unknown target node");
        }
    }

    // Boundary events: register attachment on the host activity.
    let boundary_ids: Vec<(String, String)> = nodes
        .values()
        .filter(|n| matches!(n.kind, crate::model::node::NodeKind::BoundaryEvent))
        .filter_map(|n| n.attached_to.clone().map(|host| (n.id.clone(), host)))
        .collect();
    for (boundary_id, host_id) in boundary_ids {
        if let Some(host) = nodes.get_mut(&host_id) {
            host.attachments.push(boundary_id);
        } else {
            warn!(boundary_id = %boundary_id, host = %host_id, "boundary event attachedToRef not found");
        }
    }

    // Register event sub-processes on their parent process. A process is
    // an event sub-process if its single start node carries a non-empty
    // sub_type — heuristic for "root element flagged triggered_by_event".
    let event_sub_process_ids: Vec<String> = processes
        .values()
        .filter(|p| p.triggered_by_event)
        .map(|p| p.id.clone())
        .collect();
    for sub_id in &event_sub_process_ids {
        // An event-sub-process is nested: attribute it to the process
        // that contains the parent activity, approximated here by the
        // root process when no nesting information is present.
        if let Some(root) = processes.get_mut(&tree.root_process_id) {
            if root.id != *sub_id {
                root.event_sub_processes.push(sub_id.clone());
            }
        }
    }

    Definition {
        key: process_name.to_string(),
        source_xml: source_xml.to_string(),
        definition_hash: sha256_hex(source_xml),
        root_process_id: tree.root_process_id,
        processes,
        nodes,
        flows,
        access_rules: Vec::new(),
    }
}

fn classify(el: &ParsedElement) -> Option<crate::model::node::NodeKind> {
    use crate::model::node::NodeKind::*;
    Some(match el.tag.as_str() {
        "startEvent" => StartEvent,
        "endEvent" => EndEvent,
        "intermediateCatchEvent" => IntermediateCatchEvent,
        "intermediateThrowEvent" => IntermediateThrowEvent,
        "boundaryEvent" => BoundaryEvent,
        "userTask" => UserTask,
        "serviceTask" => ServiceTask,
        "scriptTask" => ScriptTask,
        "sendTask" => SendTask,
        "receiveTask" => ReceiveTask,
        "businessRuleTask" => BusinessRuleTask,
        "manualTask" => ManualTask,
        "callActivity" => CallActivity {
            called_process_key: el.called_process_key.clone().unwrap_or_default(),
        },
        "subProcess" => SubProcess,
        "adHocSubProcess" => AdHocSubProcess,
        "transaction" => Transaction,
        "exclusiveGateway" => ExclusiveGateway,
        "inclusiveGateway" => InclusiveGateway,
        "parallelGateway" => ParallelGateway,
        "eventBasedGateway" => EventBasedGateway,
        _ => return None,
    })
}

fn classify_sub_type(el: &ParsedElement) -> Option<crate::model::node::EventSubType> {
    use crate::model::node::EventSubType::*;
    match el.event_definition.as_deref() {
        Some("timer") => Some(Timer),
        Some("message") => Some(Message),
        Some("signal") => Some(Signal),
        Some("error") => Some(Error),
        Some("escalation") => Some(Escalation),
        Some("cancel") => Some(Cancel),
        Some("compensate") => Some(Compensate),
        Some("conditional") => Some(Conditional),
        Some("terminate") => Some(Terminate),
        _ => None,
    }
}

fn classify_timer(el: &ParsedElement) -> Option<crate::model::node::TimerSpec> {
    use crate::model::node::TimerSpec;
    if let Some(d) = &el.timer_duration {
        Some(TimerSpec::Duration(d.clone()))
    } else if let Some(c) = &el.timer_cycle {
        Some(TimerSpec::Cycle(c.clone()))
    } else {
        el.timer_date.clone().map(TimerSpec::Date)
    }
}

fn classify_loop(el: &ParsedElement) -> Option<crate::model::node::LoopCharacteristics> {
    use crate::model::node::LoopCharacteristics::*;
    if let Some((parallel, collection_path, element_var)) = &el.loop_multi_instance {
        return Some(if *parallel {
            ParallelMultiInstance {
                collection_path: collection_path.clone(),
                element_var: element_var.clone(),
            }
        } else {
            SequentialMultiInstance {
                collection_path: collection_path.clone(),
                element_var: element_var.clone(),
            }
        });
    }
    if let Some((condition, max_iterations)) = &el.loop_standard {
        return Some(StandardLoop {
            condition_script: condition.clone(),
            max_iterations: *max_iterations,
        });
    }
    None
}
