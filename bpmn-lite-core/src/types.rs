use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ─── Scalar aliases ───────────────────────────────────────────

/// Every entity id. UUIDv7 so ids sort roughly by creation time,
/// matching the established `Uuid::now_v7()` convention.
pub type Id = Uuid;

/// BPMN element / process ids are author-assigned strings from the XML,
/// not generated — kept distinct from `Id` so the two can't be confused.
pub type ElementId = String;

/// Epoch milliseconds (UTC).
pub type Timestamp = i64;

/// The instance data tree, and every value read from or written into it,
/// is an opaque `serde_json::Value` — the core never interprets it beyond
/// dotted-path navigation (see `data_path.rs`).
pub type DataValue = Json;

pub fn now_ms() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

pub fn new_id() -> Id {
    Uuid::now_v7()
}

pub fn sha256_hex(data: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher.finalize().into()
}

/// Opaque correlation payload carried by messages/signals.
/// A structural submatch against a waiting item's stored match query is
/// required in addition to an id match.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CorrelationKey(pub Json);

impl CorrelationKey {
    pub fn none() -> Self {
        CorrelationKey(Json::Null)
    }

    /// True if `self` is a structural submatch of `candidate_query`: every
    /// key/value pair in `self` must be present and equal there. Mirrors
    /// the "$elemMatch"-style "stored query is a submatch of the payload" rule.
    pub fn matches(&self, candidate_query: &Json) -> bool {
        json_submatch(&self.0, candidate_query)
    }
}

fn json_submatch(pattern: &Json, value: &Json) -> bool {
    match (pattern, value) {
        (Json::Null, _) => true,
        (Json::Object(p), Json::Object(v)) => p
            .iter()
            .all(|(k, pv)| v.get(k).map(|vv| json_submatch(pv, vv)).unwrap_or(false)),
        (a, b) => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_submatch() {
        let key = CorrelationKey(serde_json::json!({"case_id": "C1"}));
        assert!(key.matches(&serde_json::json!({"case_id": "C1", "extra": 1})));
        assert!(!key.matches(&serde_json::json!({"case_id": "C2"})));
    }

    #[test]
    fn empty_correlation_matches_anything() {
        let key = CorrelationKey::none();
        assert!(key.matches(&serde_json::json!({"anything": true})));
    }
}
