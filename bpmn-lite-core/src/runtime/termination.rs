//! Instance/token termination: reaching a
//! terminate end event, an unhandled error, or an explicit
//! `engine.terminate` call all funnel through here. Idempotent — ending
//! an already-ended instance is a no-op rather than an error, since
//! concurrent completions racing to end the same instance are expected
//!.

use crate::events::RuntimeEvent;
use crate::runtime::execution::{Execution, InstanceStatus, TokenStatus};
use crate::types::now_ms;

/// Terminate every non-terminal token and mark the instance terminated.
/// No-op if the instance has already reached a terminal status.
pub fn terminate_instance(exec: &mut Execution) {
    if matches!(exec.status, InstanceStatus::Ended | InstanceStatus::Terminated) {
        return;
    }
    for token in exec.tokens.values_mut() {
        if !matches!(token.status, TokenStatus::Ended | TokenStatus::Terminated) {
            token.status = TokenStatus::Terminated;
        }
    }
    exec.status = InstanceStatus::Terminated;
    exec.ended_at = Some(now_ms());
    exec.emit(RuntimeEvent::ProcessTerminated {
        instance_id: exec.instance_id,
        at: exec.ended_at.unwrap(),
    });
}

/// Mark the instance normally ended once every token has reached a
/// terminal state. Idempotent for the same reason as
/// `terminate_instance`.
pub fn end_instance_if_complete(exec: &mut Execution) {
    if matches!(exec.status, InstanceStatus::Ended | InstanceStatus::Terminated) {
        return;
    }
    if exec.is_converged_complete() {
        exec.status = InstanceStatus::Ended;
        exec.ended_at = Some(now_ms());
        exec.emit(RuntimeEvent::ProcessEnd {
            instance_id: exec.instance_id,
            at: exec.ended_at.unwrap(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::execution::Token;
    use crate::types::new_id;

    #[test]
    fn terminate_is_idempotent() {
        let mut exec = Execution::new(new_id(), "def1");
        let token = Token::new_root("P1");
        exec.tokens.insert(token.id, token);
        terminate_instance(&mut exec);
        let ended_at = exec.ended_at;
        terminate_instance(&mut exec);
        assert_eq!(exec.ended_at, ended_at);
        assert_eq!(exec.status, InstanceStatus::Terminated);
    }

    #[test]
    fn end_instance_waits_for_all_tokens() {
        let mut exec = Execution::new(new_id(), "def1");
        let t1 = Token::new_root("P1");
        let mut t2 = Token::new_root("P1");
        t2.status = TokenStatus::Ended;
        exec.tokens.insert(t1.id, t1);
        exec.tokens.insert(t2.id, t2);
        end_instance_if_complete(&mut exec);
        assert_eq!(exec.status, InstanceStatus::Running);
    }
}
