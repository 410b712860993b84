//! Message behavior: message catch events/tasks wait
//! for `engine.throw_message` to deliver a matching correlation key;
//! message throw events/send tasks fire-and-continue immediately,
//! leaving delivery to the `AppDelegate`.

use super::{Action, BehaviorContext, BehaviorOutcome};
use crate::model::node::NodeKind;

pub fn on_enter(ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
    if ctx.node.message_id.is_none() {
        return BehaviorOutcome::continue_();
    }
    match ctx.node.kind {
        NodeKind::IntermediateCatchEvent
        | NodeKind::BoundaryEvent
        | NodeKind::ReceiveTask
        | NodeKind::StartEvent => BehaviorOutcome::wait(),
        _ => BehaviorOutcome::continue_(),
    }
}

/// Called once a correlated message has been delivered; the merge
/// fragment is the message payload landing at the item's `data_path`.
pub fn on_delivered(payload: serde_json::Value) -> BehaviorOutcome {
    BehaviorOutcome::with_merge(Action::Continue, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::test_support::{RecordingAppDelegate, StubScriptHost};
    use crate::model::node::Node;
    use serde_json::json;

    #[test]
    fn catch_event_waits_for_message() {
        let mut node = Node::new("m1", NodeKind::IntermediateCatchEvent, "P1");
        node.message_id = Some("OrderPlaced".into());
        let script_host = StubScriptHost::new();
        let app = RecordingAppDelegate::new(json!(null));
        let ctx = BehaviorContext {
            node: &node,
            vars: &json!({}),
            script_host: &script_host,
            app_delegate: &app,
            now_ms: 0,
            iteration: None,
        };
        assert_eq!(on_enter(&ctx).action, crate::behavior::Action::Wait);
    }

    #[test]
    fn throw_event_continues_immediately() {
        let mut node = Node::new("m2", NodeKind::IntermediateThrowEvent, "P1");
        node.message_id = Some("Notify".into());
        let script_host = StubScriptHost::new();
        let app = RecordingAppDelegate::new(json!(null));
        let ctx = BehaviorContext {
            node: &node,
            vars: &json!({}),
            script_host: &script_host,
            app_delegate: &app,
            now_ms: 0,
            iteration: None,
        };
        assert_eq!(on_enter(&ctx).action, crate::behavior::Action::Continue);
    }
}
