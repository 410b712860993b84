//! Signal behavior. Unlike messages, a signal
//! broadcast matches every waiting item with the same `signal_id`
//! simultaneously — there is no 1:1 correlation key requirement, though
//! a correlation key expression may still be present to scope it.

use super::{Action, BehaviorContext, BehaviorOutcome};
use crate::model::node::NodeKind;

pub fn on_enter(ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
    if ctx.node.signal_id.is_none() {
        return BehaviorOutcome::continue_();
    }
    match ctx.node.kind {
        NodeKind::IntermediateCatchEvent | NodeKind::BoundaryEvent | NodeKind::StartEvent => {
            BehaviorOutcome::wait()
        }
        _ => BehaviorOutcome::continue_(),
    }
}

pub fn on_broadcast(payload: serde_json::Value) -> BehaviorOutcome {
    BehaviorOutcome::with_merge(Action::Continue, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::test_support::{RecordingAppDelegate, StubScriptHost};
    use crate::model::node::Node;
    use serde_json::json;

    #[test]
    fn signal_catch_waits() {
        let mut node = Node::new("s1", NodeKind::IntermediateCatchEvent, "P1");
        node.signal_id = Some("Alarm".into());
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
}
