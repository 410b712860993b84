//! Error/escalation propagation: a thrown
//! error or escalation walks the throwing token's activity stack from
//! the innermost enclosing sub-process/transaction outward, looking
//! for the first attached boundary event (or event sub-process start)
//! that catches it. If nothing in the instance catches it, the
//! instance ends with `EngineError::UnhandledBpmnError`.

use crate::behavior::error_escalation::{catches, Thrown};
use crate::model::definition::Definition;
use crate::model::node::ElementId;

/// Search order: activity stack from innermost (last pushed) outward.
/// For each enclosing activity, check its own boundary events first,
/// then any event sub-processes nested directly inside it. Returns the
/// catching boundary/start node id, if any.
pub fn find_catcher(
    def: &Definition,
    activity_stack: &[ElementId],
    thrown: Thrown,
    code: &str,
) -> Option<ElementId> {
    for host_id in activity_stack.iter().rev() {
        let Ok(host) = def.node(host_id) else { continue };
        for boundary_id in &host.attachments {
            if let Ok(boundary) = def.node(boundary_id) {
                if catches(boundary, thrown, code) {
                    return Some(boundary.id.clone());
                }
            }
        }
        if let Ok(process) = def.process(host_id) {
            for sub_id in &process.event_sub_processes {
                if let Ok(sub_process) = def.process(sub_id) {
                    for start_id in &sub_process.start_nodes {
                        if let Ok(start) = def.node(start_id) {
                            if catches(start, thrown, code) {
                                return Some(start.id.clone());
                            }
                        }
                    }
                }
            }
        }
    }
    None
}
