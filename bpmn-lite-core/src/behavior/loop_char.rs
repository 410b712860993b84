//! Multi-instance and standard loop characteristics.
//! A sequential/parallel multi-instance activity spawns one `Loop`
//! entry per element of its collection; sequential runs them one at a
//! time, parallel spawns them all at once. A standard loop re-enters
//! the same activity while its condition script remains true, capped
//! by `max_iterations` as a runaway guard.

use crate::model::node::LoopCharacteristics;
use serde_json::Value as Json;

#[derive(Debug, PartialEq, Eq)]
pub enum LoopKind {
    Sequential,
    Parallel,
    Standard,
}

pub fn kind_of(lc: &LoopCharacteristics) -> LoopKind {
    match lc {
        LoopCharacteristics::SequentialMultiInstance { .. } => LoopKind::Sequential,
        LoopCharacteristics::ParallelMultiInstance { .. } => LoopKind::Parallel,
        LoopCharacteristics::StandardLoop { .. } => LoopKind::Standard,
    }
}

/// Resolve a multi-instance collection path into its elements. An
/// absent or non-array value yields a single implicit iteration so the
/// activity still behaves like a normal (non-looping) one rather than
/// silently vanishing.
pub fn resolve_collection<'a>(vars: &'a Json, collection_path: &str) -> Vec<Json> {
    match crate::data_path::read(vars, collection_path) {
        Some(Json::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
        None => vec![Json::Null],
    }
}

/// Whether a standard loop should run another iteration: capped by
/// `max_iterations` regardless of what the condition script says.
pub fn should_continue_standard_loop(max_iterations: u32, iterations_so_far: u32, condition_true: bool) -> bool {
    iterations_so_far < max_iterations && condition_true
}
