//! Gateway split/convergence rules. Exclusive
//! gateways never wait: the first token through picks one outbound
//! flow and passes straight on. Parallel and inclusive gateways, when
//! used as a join, wait for every token that could still arrive; the
//! "could still arrive" test walks the live graph rather than counting
//! static inbound flows, so a token that took a discarded exclusive
//! branch upstream never blocks convergence forever.

use crate::model::definition::Definition;
use crate::model::node::{FlowKind, Node, NodeKind};
use crate::types::Id;
use serde_json::Value as Json;

/// Outcome of evaluating a gateway's outbound split.
pub struct Split {
    pub taken_flow_ids: Vec<String>,
}

/// Evaluate which outbound flows a split gateway activates. `eval_cond`
/// is supplied by the caller since condition evaluation may require an
/// async script host round trip.
pub fn split<F>(def: &Definition, node: &Node, eval_cond: F) -> Split
where
    F: Fn(Option<&str>) -> bool,
{
    let outbound = def.outbound_flows(&node.id);
    match node.kind {
        NodeKind::ParallelGateway => Split {
            taken_flow_ids: outbound
                .iter()
                .filter(|f| f.kind == FlowKind::Sequence)
                .map(|f| f.id.clone())
                .collect(),
        },
        NodeKind::ExclusiveGateway => {
            let chosen = outbound
                .iter()
                .filter(|f| f.kind == FlowKind::Sequence && !f.is_default)
                .find(|f| eval_cond(f.condition_expr.as_deref()))
                .or_else(|| outbound.iter().find(|f| f.is_default));
            Split {
                taken_flow_ids: chosen.map(|f| vec![f.id.clone()]).unwrap_or_default(),
            }
        }
        NodeKind::InclusiveGateway => {
            let matched: Vec<String> = outbound
                .iter()
                .filter(|f| f.kind == FlowKind::Sequence && !f.is_default)
                .filter(|f| eval_cond(f.condition_expr.as_deref()))
                .map(|f| f.id.clone())
                .collect();
            if matched.is_empty() {
                Split {
                    taken_flow_ids: outbound
                        .iter()
                        .find(|f| f.is_default)
                        .map(|f| vec![f.id.clone()])
                        .unwrap_or_default(),
                }
            } else {
                Split { taken_flow_ids: matched }
            }
        }
        _ => Split {
            taken_flow_ids: outbound.iter().map(|f| f.id.clone()).collect(),
        },
    }
}

/// True if the gateway should wait for siblings before continuing.
/// Exclusive and event-based
/// gateways never converge — each arriving token passes straight
/// through.
pub fn is_converging(node: &Node) -> bool {
    matches!(node.kind, NodeKind::ParallelGateway | NodeKind::InclusiveGateway)
}

/// Whether a converging gateway can fire now: true once no other
/// active/waiting token in the execution can still reach it. `arrived`
/// is the set of token ids already parked at this gateway.
pub fn can_converge(
    def: &Definition,
    gateway_node_id: &str,
    arrived: &[Id],
    other_active_node_ids: &[(Id, &str)],
) -> bool {
    other_active_node_ids
        .iter()
        .filter(|(id, _)| !arrived.contains(id))
        .all(|(_, node_id)| !def.can_reach(node_id, gateway_node_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::definition::{load_definition, ParsedElement, ParsedTree};
    use crate::types::new_id;

    fn parallel_split_join() -> Definition {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "start".into(), tag: "startEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "split".into(), tag: "parallelGateway".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "a".into(), tag: "serviceTask".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "b".into(), tag: "serviceTask".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "join".into(), tag: "parallelGateway".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "end".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "f1".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("start".into()), target_ref: Some("split".into()), ..Default::default() },
                ParsedElement { id: "f2".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("split".into()), target_ref: Some("a".into()), ..Default::default() },
                ParsedElement { id: "f3".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("split".into()), target_ref: Some("b".into()), ..Default::default() },
                ParsedElement { id: "f4".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("a".into()), target_ref: Some("join".into()), ..Default::default() },
                ParsedElement { id: "f5".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("b".into()), target_ref: Some("join".into()), ..Default::default() },
                ParsedElement { id: "f6".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("join".into()), target_ref: Some("end".into()), ..Default::default() },
            ],
        };
        load_definition("p", "<xml/>", tree)
    }

    #[test]
    fn parallel_split_takes_every_outbound() {
        let def = parallel_split_join();
        let node = def.node("split").unwrap();
        let result = split(&def, node, |_| false);
        assert_eq!(result.taken_flow_ids.len(), 2);
    }

    #[test]
    fn parallel_join_waits_until_sibling_arrives() {
        let def = parallel_split_join();
        let tok_a = new_id();
        let tok_b = new_id();
        // only tok_a has arrived; tok_b is still sitting at "b" and can reach "join"
        assert!(!can_converge(&def, "join", &[tok_a], &[(tok_a, "join"), (tok_b, "b")]));
        // once tok_b also arrives, nothing else can reach "join"
        assert!(can_converge(&def, "join", &[tok_a, tok_b], &[(tok_a, "join"), (tok_b, "join")]));
    }

    #[test]
    fn exclusive_gateway_never_converges() {
        let def = parallel_split_join();
        let mut node = def.node("split").unwrap().clone();
        node.kind = NodeKind::ExclusiveGateway;
        assert!(!is_converging(&node));
    }
}
