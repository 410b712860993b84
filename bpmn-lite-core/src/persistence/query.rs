//! Query translator. A single condition AST expresses both
//! the filter forwarded to a backing store and the in-memory
//! post-filter every result is re-checked against — "rewrite the
//! dotted/nested-collection shape into `$elemMatch`, then re-filter
//! exactly" is two passes over the *same*
//! `Query` value rather than two different representations.

use serde_json::Value as Json;

#[derive(Clone, Debug)]
pub enum Query {
    All,
    And(Vec<Query>),
    Or(Vec<Query>),
    Field(String, FieldOp),
}

#[derive(Clone, Debug)]
pub enum FieldOp {
    Eq(Json),
    Gt(Json),
    Gte(Json),
    Lt(Json),
    Lte(Json),
    Exists(bool),
    In(Vec<Json>),
    /// Dotted path into an array field: true if at least one element of
    /// the array at `path` matches the nested query.
    ElemMatch(Box<Query>),
}

impl Query {
    pub fn eq(path: impl Into<String>, value: Json) -> Self {
        Query::Field(path.into(), FieldOp::Eq(value))
    }

    pub fn and(parts: Vec<Query>) -> Self {
        Query::And(parts)
    }

    pub fn or(parts: Vec<Query>) -> Self {
        Query::Or(parts)
    }
}

/// Exact in-memory evaluator. This is always run as the final
/// post-filter pass regardless of what the backing store's own query
/// layer was able to narrow down, so a store that only prunes
/// approximately (e.g. a Postgres `@>` containment check standing in
/// for `$elemMatch`) can never return a false positive to the caller.
pub fn matches(doc: &Json, query: &Query) -> bool {
    match query {
        Query::All => true,
        Query::And(parts) => parts.iter().all(|q| matches(doc, q)),
        Query::Or(parts) => parts.iter().any(|q| matches(doc, q)),
        Query::Field(path, op) => match_field(doc, path, op),
    }
}

fn match_field(doc: &Json, path: &str, op: &FieldOp) -> bool {
    let value = crate::data_path::read(doc, path);
    match op {
        FieldOp::Eq(expected) => value == Some(expected),
        FieldOp::Gt(expected) => compare(value, expected).map(|o| o.is_gt()).unwrap_or(false),
        FieldOp::Gte(expected) => compare(value, expected).map(|o| !o.is_lt()).unwrap_or(false),
        FieldOp::Lt(expected) => compare(value, expected).map(|o| o.is_lt()).unwrap_or(false),
        FieldOp::Lte(expected) => compare(value, expected).map(|o| !o.is_gt()).unwrap_or(false),
        FieldOp::Exists(want) => value.is_some() == *want,
        FieldOp::In(options) => value.map(|v| options.contains(v)).unwrap_or(false),
        FieldOp::ElemMatch(nested) => match value {
            Some(Json::Array(items)) => items.iter().any(|item| matches(item, nested)),
            _ => false,
        },
    }
}

fn compare(value: Option<&Json>, expected: &Json) -> Option<std::cmp::Ordering> {
    let value = value?;
    match (value, expected) {
        (Json::Number(a), Json::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Json::String(a), Json::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Rewrite a query whose leaf `Field` paths cross into an array (e.g.
/// `"items.price"` where `items` is an array of objects) into an
/// equivalent `ElemMatch` shape a store's native query language can
/// push down, given the static shape of the collection's array fields.
/// `array_fields` lists which top-level paths are arrays-of-objects;
/// anything else passes through unchanged.
pub fn rewrite_for_elem_match(query: Query, array_fields: &[&str]) -> Query {
    match query {
        Query::And(parts) => Query::And(
            parts
                .into_iter()
                .map(|q| rewrite_for_elem_match(q, array_fields))
                .collect(),
        ),
        Query::Or(parts) => Query::Or(
            parts
                .into_iter()
                .map(|q| rewrite_for_elem_match(q, array_fields))
                .collect(),
        ),
        Query::Field(path, op) => {
            if let Some(array_field) = array_fields.iter().find(|af| {
                path.starts_with(*af) && path.len() > af.len() && path.as_bytes()[af.len()] == b'.'
            }) {
                let nested_path = &path[array_field.len() + 1..];
                Query::Field(
                    array_field.to_string(),
                    FieldOp::ElemMatch(Box::new(Query::Field(nested_path.to_string(), op))),
                )
            } else {
                Query::Field(path, op)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_matches_dotted_path() {
        let doc = json!({"instance": {"status": "running"}});
        assert!(matches(&doc, &Query::eq("instance.status", json!("running"))));
        assert!(!matches(&doc, &Query::eq("instance.status", json!("ended"))));
    }

    #[test]
    fn comparisons_work_on_numbers() {
        let doc = json!({"amount": 42});
        assert!(matches(&doc, &Query::Field("amount".into(), FieldOp::Gt(json!(10)))));
        assert!(!matches(&doc, &Query::Field("amount".into(), FieldOp::Lt(json!(10)))));
    }

    #[test]
    fn or_and_combinators() {
        let doc = json!({"a": 1, "b": 2});
        let q = Query::or(vec![Query::eq("a", json!(9)), Query::eq("b", json!(2))]);
        assert!(matches(&doc, &q));
    }

    #[test]
    fn rewrites_nested_array_path_to_elem_match() {
        let q = Query::eq("items.sku", json!("WIDGET"));
        let rewritten = rewrite_for_elem_match(q, &["items"]);
        let doc = json!({"items": [{"sku": "OTHER"}, {"sku": "WIDGET"}]});
        assert!(matches(&doc, &rewritten));
        let miss = json!({"items": [{"sku": "OTHER"}]});
        assert!(!matches(&miss, &rewritten));
    }

    #[test]
    fn exists_and_in_operators() {
        let doc = json!({"code": "E1"});
        assert!(matches(&doc, &Query::Field("code".into(), FieldOp::Exists(true))));
        assert!(!matches(&doc, &Query::Field("missing".into(), FieldOp::Exists(true))));
        assert!(matches(
            &doc,
            &Query::Field("code".into(), FieldOp::In(vec![json!("E1"), json!("E2")]))
        ));
    }
}
