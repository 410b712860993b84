//! Timer behavior: start/intermediate timer events and
//! boundary timers resolve a `TimerSpec` into a due timestamp and wait
//! until the scheduler fires it. Resolution of the ISO-8601 expression
//! itself lives in `scheduler.rs`; this module only decides the action.

use super::{Action, BehaviorContext, BehaviorOutcome};
use crate::model::node::TimerSpec;

/// A timer-bearing node always waits on enter; `scheduler` is
/// responsible for calling back into the engine with a `signal` once
/// the timer is due.
pub fn on_enter(ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
    match &ctx.node.timer_spec {
        Some(_) => BehaviorOutcome::wait(),
        None => BehaviorOutcome::continue_(),
    }
}

/// True once the scheduler has resolved and fired this timer. The
/// engine calls this only from the timer-fired code path, never from
/// ordinary `invoke`.
pub fn on_fire(_ctx: &BehaviorContext<'_>) -> Action {
    Action::Continue
}

pub fn is_timer(spec: &TimerSpec) -> bool {
    matches!(spec, TimerSpec::Duration(_) | TimerSpec::Cycle(_) | TimerSpec::Date(_))
}
