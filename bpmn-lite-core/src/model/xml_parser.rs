//! Reference BPMN 2.0 XML parser. The XML grammar is treated as an
//! external collaborator — production deployments are expected to bring
//! their own `BpmnParser`. This one exists to exercise the loader and
//! the seeded end-to-end scenarios against real `<definitions>` markup,
//! grounded on the established quick-xml pull-parser idiom.

use super::definition::{BpmnParser, ParsedElement, ParsedTree};
use crate::error::{EngineError, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

pub struct QuickXmlBpmnParser;

impl QuickXmlBpmnParser {
    pub fn new() -> Self {
        QuickXmlBpmnParser
    }
}

impl Default for QuickXmlBpmnParser {
    fn default() -> Self {
        Self::new()
    }
}

const FLOW_NODE_TAGS: &[&str] = &[
    "startEvent",
    "endEvent",
    "intermediateCatchEvent",
    "intermediateThrowEvent",
    "boundaryEvent",
    "userTask",
    "serviceTask",
    "scriptTask",
    "sendTask",
    "receiveTask",
    "businessRuleTask",
    "manualTask",
    "callActivity",
    "subProcess",
    "adHocSubProcess",
    "transaction",
    "exclusiveGateway",
    "inclusiveGateway",
    "parallelGateway",
    "eventBasedGateway",
];

const CONTAINER_TAGS: &[&str] = &["process", "subProcess", "adHocSubProcess", "transaction"];

impl BpmnParser for QuickXmlBpmnParser {
    fn parse(&self, xml_source: &str) -> Result<ParsedTree> {
        let mut reader = Reader::from_str(xml_source);
        reader.config_mut().trim_text(true);

        let mut tree = ParsedTree::default();
        let mut process_stack: Vec<String> = Vec::new();
        // element id -> (containing process, pending timer/loop child tags)
        let mut pending_element: Option<ParsedElement> = None;
        let mut pending_event_def: Option<String> = None;
        let mut buf = Vec::new();
        let mut seen_root = false;

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| EngineError::DefinitionLoad(format!("xml parse error: {e}")))?
            {
                Event::Eof => break,
                ev @ (Event::Start(_) | Event::Empty(_)) => {
                    let is_empty = matches!(ev, Event::Empty(_));
                    let e = match &ev {
                        Event::Start(e) | Event::Empty(e) => e,
                        _ => unreachable!(),
                    };
                    let local = local_name(e.name().as_ref());
                    let attrs = collect_attrs(e);

                    if CONTAINER_TAGS.contains(&local.as_str()) {
                        let id = attrs.get("id").cloned().unwrap_or_default();
                        if !seen_root {
                            tree.root_process_id = id.clone();
                            tree.process_name = attrs
                                .get("name")
                                .cloned()
                                .unwrap_or_else(|| id.clone());
                            seen_root = true;
                        }
                        process_stack.push(id);
                        if is_empty {
                            process_stack.pop();
                        }
                    } else if FLOW_NODE_TAGS.contains(&local.as_str()) {
                        let process_id = process_stack.last().cloned().unwrap_or_default();
                        let mut el = ParsedElement {
                            id: attrs.get("id").cloned().unwrap_or_default(),
                            name: attrs.get("name").cloned(),
                            tag: local.clone(),
                            process_id,
                            attached_to_ref: attrs.get("attachedToRef").cloned(),
                            cancel_activity: attrs
                                .get("cancelActivity")
                                .map(|v| v != "false")
                                .unwrap_or(true),
                            called_process_key: attrs.get("calledElement").cloned(),
                            triggered_by_event: attrs
                                .get("triggeredByEvent")
                                .map(|v| v == "true")
                                .unwrap_or(false),
                            ..Default::default()
                        };
                        if local == "callActivity" {
                            el.called_process_key = attrs.get("calledElement").cloned();
                        }
                        if is_empty {
                            tree.elements.push(el);
                        } else {
                            pending_element = Some(el);
                        }
                    } else if local == "sequenceFlow" || local == "messageFlow" {
                        let process_id = process_stack.last().cloned().unwrap_or_default();
                        tree.elements.push(ParsedElement {
                            id: attrs.get("id").cloned().unwrap_or_default(),
                            name: attrs.get("name").cloned(),
                            tag: local.clone(),
                            process_id,
                            source_ref: attrs.get("sourceRef").cloned(),
                            target_ref: attrs.get("targetRef").cloned(),
                            is_default: false,
                            ..Default::default()
                        });
                    } else if local == "timerEventDefinition" {
                        pending_event_def = Some("timer".into());
                    } else if local == "messageEventDefinition" {
                        pending_event_def = Some("message".into());
                        if let Some(el) = pending_element.as_mut() {
                            el.message_id = attrs.get("messageRef").cloned();
                        }
                    } else if local == "signalEventDefinition" {
                        pending_event_def = Some("signal".into());
                        if let Some(el) = pending_element.as_mut() {
                            el.signal_id = attrs.get("signalRef").cloned();
                        }
                    } else if local == "errorEventDefinition" {
                        pending_event_def = Some("error".into());
                        if let Some(el) = pending_element.as_mut() {
                            el.error_code = attrs.get("errorRef").cloned();
                        }
                    } else if local == "escalationEventDefinition" {
                        pending_event_def = Some("escalation".into());
                        if let Some(el) = pending_element.as_mut() {
                            el.escalation_code = attrs.get("escalationRef").cloned();
                        }
                    } else if local == "terminateEventDefinition" {
                        pending_event_def = Some("terminate".into());
                    } else if local == "conditionalEventDefinition" {
                        pending_event_def = Some("conditional".into());
                    } else if local == "multiInstanceLoopCharacteristics" {
                        if let Some(el) = pending_element.as_mut() {
                            let parallel = attrs
                                .get("isSequential")
                                .map(|v| v != "true")
                                .unwrap_or(true);
                            el.loop_multi_instance =
                                Some((parallel, String::new(), String::new()));
                        }
                    }
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| EngineError::DefinitionLoad(format!("xml text error: {e}")))?
                        .into_owned();
                    if let Some(def) = &pending_event_def {
                        if let Some(el) = pending_element.as_mut() {
                            match def.as_str() {
                                "timer" => el.timer_duration = Some(text),
                                _ => {}
                            }
                        }
                    }
                }
                Event::End(ref e) => {
                    let local = local_name(e.name().as_ref());
                    if CONTAINER_TAGS.contains(&local.as_str()) {
                        process_stack.pop();
                    } else if FLOW_NODE_TAGS.contains(&local.as_str()) {
                        if let Some(mut el) = pending_element.take() {
                            el.event_definition = pending_event_def.take();
                            tree.elements.push(el);
                        }
                    }
                }
                _ => {}
            }
            buf.clear();
        }

        if tree.root_process_id.is_empty() {
            return Err(EngineError::DefinitionLoad(
                "no <process> element found".into(),
            ));
        }

        Ok(tree)
    }
}

fn local_name(qualified: &[u8]) -> String {
    let s = String::from_utf8_lossy(qualified);
    match s.rfind(':') {
        Some(idx) => s[idx + 1..].to_string(),
        None => s.to_string(),
    }
}

fn collect_attrs(e: &quick_xml::events::BytesStart) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = local_name(attr.key.as_ref());
        if let Ok(value) = attr.unescape_value() {
            map.insert(key, value.into_owned());
        }
    }
    map
}
