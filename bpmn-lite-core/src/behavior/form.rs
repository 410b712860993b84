//! Form behavior: a `FormSpec` is
//! surfaced to whatever fills the task (a human via a UI, typically)
//! and its submitted values are validated for presence before the task
//! is allowed to end. Field-level typing/expression defaults are an
//! external concern; the core only enforces required-field presence.

use crate::model::node::FormSpec;
use serde_json::Value as Json;

/// Missing required fields, in declaration order. Empty result means
/// the submission is acceptable.
pub fn missing_fields(spec: &FormSpec, submission: &Json) -> Vec<String> {
    spec.fields
        .iter()
        .filter(|f| submission.get(&f.id).is_none())
        .map(|f| f.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::FormField;
    use serde_json::json;

    #[test]
    fn flags_missing_required_fields() {
        let spec = FormSpec {
            fields: vec![
                FormField { id: "amount".into(), label: "Amount".into(), field_type: "number".into(), default_expression: None },
                FormField { id: "approver".into(), label: "Approver".into(), field_type: "string".into(), default_expression: None },
            ],
        };
        let submission = json!({"amount": 100});
        assert_eq!(missing_fields(&spec, &submission), vec!["approver".to_string()]);
    }

    #[test]
    fn complete_submission_has_no_missing_fields() {
        let spec = FormSpec {
            fields: vec![FormField { id: "x".into(), label: "X".into(), field_type: "string".into(), default_expression: None }],
        };
        assert!(missing_fields(&spec, &json!({"x": "y"})).is_empty());
    }
}
