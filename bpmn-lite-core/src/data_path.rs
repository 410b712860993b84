//! Dotted-path read/create/merge into the instance data tree, and the
//! `vars` projection used by Items. Grounded on the established flat `flags: BTreeMap<FlagKey,
//! Value>` model, generalized from a flat key space to the nested
//! `serde_json::Value` tree this crate's data model requires.

use serde_json::{Map, Value};

/// Split `"a.b.c"` into `["a", "b", "c"]`. Empty path yields no segments
/// (root access).
fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('.').collect()
    }
}

/// Read a value at a dotted path. Missing intermediate keys yield `None`
/// rather than an error — absence is a normal, queryable state.
pub fn read<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = root;
    for seg in segments(path) {
        cur = cur.as_object()?.get(seg)?;
    }
    Some(cur)
}

/// Write a value at a dotted path, creating intermediate objects as
/// needed. Never mutates any key outside the path being written — this
/// is the isolation invariant checked by the test below.
pub fn create_or_set(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    let segs = segments(path);
    if segs.is_empty() {
        *root = value;
        return;
    }
    let mut cur = root;
    for seg in &segs[..segs.len() - 1] {
        let obj = cur.as_object_mut().expect("ensured object above");
        cur = obj
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
    }
    let obj = cur.as_object_mut().expect("ensured object above");
    obj.insert(segs[segs.len() - 1].to_string(), value);
}

/// Merge `value` into whatever already lives at `path`: objects are
/// merged key-by-key (recursively), any other combination of types
/// replaces outright. This is the only way the Execution's shared
/// `data` tree is mutated.
pub fn merge(root: &mut Value, path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    let segs = segments(path);
    if segs.is_empty() {
        merge_values(root, value);
        return;
    }
    let mut cur = root;
    for seg in &segs[..segs.len() - 1] {
        let obj = cur.as_object_mut().expect("ensured object above");
        cur = obj
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !cur.is_object() {
            *cur = Value::Object(Map::new());
        }
    }
    let obj = cur.as_object_mut().expect("ensured object above");
    let last = segs[segs.len() - 1];
    match obj.get_mut(last) {
        Some(existing) => merge_values(existing, value),
        None => {
            obj.insert(last.to_string(), value);
        }
    }
}

fn merge_values(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(e), Value::Object(i)) => {
            for (k, v) in i {
                match e.get_mut(&k) {
                    Some(slot) => merge_values(slot, v),
                    None => {
                        e.insert(k, v);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Qualify a token-relative path with the token's `data_path` prefix.
/// A token writing under `data_path = "orders.0"` and asking to write
/// key `"status"` actually writes `"orders.0.status"`.
pub fn qualify(data_path: &str, key: &str) -> String {
    if data_path.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        data_path.to_string()
    } else {
        format!("{data_path}.{key}")
    }
}

/// Project a flat `vars` view for an Item: everything reachable at its
/// token's `data_path`, falling back to `input`/`output` when the scope
/// is empty. This backs the `vars` projection handed to behaviors.
pub fn project_vars(root: &Value, data_path: &str) -> Value {
    read(root, data_path).cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn read_nested() {
        let root = json!({"a": {"b": {"c": 42}}});
        assert_eq!(read(&root, "a.b.c"), Some(&json!(42)));
        assert_eq!(read(&root, "a.x"), None);
    }

    #[test]
    fn create_builds_intermediates() {
        let mut root = json!({});
        create_or_set(&mut root, "a.b.c", json!(1));
        assert_eq!(root, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn merge_keeps_sibling_keys() {
        let mut root = json!({"a": {"x": 1, "y": 2}});
        merge(&mut root, "a", json!({"y": 3, "z": 4}));
        assert_eq!(root, json!({"a": {"x": 1, "y": 3, "z": 4}}));
    }

    #[test]
    fn write_under_path_does_not_touch_siblings() {
        // data path isolation: writes must not leak across sibling paths
        let mut root = json!({"tokenA": {"v": 1}, "tokenB": {"v": 2}});
        merge(&mut root, "tokenA", json!({"v": 99}));
        assert_eq!(root["tokenB"]["v"], json!(2));
    }

    #[test]
    fn qualify_handles_empty_prefix() {
        assert_eq!(qualify("", "x"), "x");
        assert_eq!(qualify("a.b", "x"), "a.b.x");
    }
}
