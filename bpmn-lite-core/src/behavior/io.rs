//! Input/output mapping: before a task's `start` step, its
//! `inputs` are resolved into a scratch object handed to the
//! `AppDelegate`/`ScriptHost`; after `end`, its `outputs` are resolved
//! from the task's result and merged back at the item's `data_path`.

use crate::model::node::{IoParameter, IoSource, IoSpec};
use serde_json::{Map, Value as Json};

/// Resolve every input parameter against the current `vars` tree.
/// Literal sources pass through verbatim; expression/script sources are
/// left for the caller to evaluate via `ScriptHost` since that requires
/// an async round trip this pure function can't make.
pub fn resolve_literals(spec: &IoSpec, vars: &Json) -> Json {
    let mut out = Map::new();
    for param in &spec.inputs {
        if let IoSource::Literal(v) = &param.source {
            out.insert(param.name.clone(), v.clone());
        } else if let IoSource::Expression(path) = &param.source {
            if let Some(v) = crate::data_path::read(vars, path) {
                out.insert(param.name.clone(), v.clone());
            }
        }
    }
    Json::Object(out)
}

/// Which output parameters require a script evaluation (as opposed to
/// being resolvable directly from the task result).
pub fn scripted_outputs(spec: &IoSpec) -> Vec<&IoParameter> {
    spec.outputs
        .iter()
        .filter(|p| matches!(p.source, IoSource::Script(_)))
        .collect()
}

/// Project a task's raw result onto its declared (non-scripted) output
/// parameters.
pub fn resolve_literal_outputs(spec: &IoSpec, result: &Json) -> Json {
    let mut out = Map::new();
    for param in &spec.outputs {
        match &param.source {
            IoSource::Literal(v) => {
                out.insert(param.name.clone(), v.clone());
            }
            IoSource::Expression(path) => {
                if let Some(v) = crate::data_path::read(result, path) {
                    out.insert(param.name.clone(), v.clone());
                }
            }
            IoSource::Script(_) => {}
        }
    }
    Json::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_literal_and_expression_inputs() {
        let spec = IoSpec {
            inputs: vec![
                IoParameter { name: "amount".into(), source: IoSource::Literal(json!(42)) },
                IoParameter {
                    name: "customer".into(),
                    source: IoSource::Expression("order.customer".into()),
                },
            ],
            outputs: vec![],
        };
        let vars = json!({"order": {"customer": "alice"}});
        let resolved = resolve_literals(&spec, &vars);
        assert_eq!(resolved["amount"], json!(42));
        assert_eq!(resolved["customer"], json!("alice"));
    }

    #[test]
    fn scripted_outputs_are_excluded_from_literal_projection() {
        let spec = IoSpec {
            inputs: vec![],
            outputs: vec![
                IoParameter { name: "approved".into(), source: IoSource::Script("compute_approved".into()) },
                IoParameter { name: "raw".into(), source: IoSource::Expression("status".into()) },
            ],
        };
        assert_eq!(scripted_outputs(&spec).len(), 1);
        let result = json!({"status": "ok"});
        let projected = resolve_literal_outputs(&spec, &result);
        assert_eq!(projected["raw"], json!("ok"));
        assert!(projected.get("approved").is_none());
    }
}
