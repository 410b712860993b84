//! Script behavior: a
//! node's `scripts` map holds one ordered list of script bodies per
//! lifecycle step name (`"validate"`, `"start"`, `"end"`). This module
//! only looks up what to run; evaluation always goes through
//! `external::ScriptHost`, never executed in-process.

use crate::model::node::Node;

pub fn scripts_for_step<'a>(node: &'a Node, step: &str) -> &'a [String] {
    node.scripts.get(step).map(Vec::as_slice).unwrap_or(&[])
}
