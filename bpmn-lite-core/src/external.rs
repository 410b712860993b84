//! Trait boundaries for collaborators the core never implements itself
//! : script evaluation, outbound
//! side-effecting calls, and an external read model feeding gateway
//! conditions. Production deployments supply real implementations;
//! `#[cfg(test)]` stubs here exist only to exercise the engine.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value as Json;

/// Untrusted script evaluation. The core passes it a script
/// body plus the current `vars` projection and gets back either a new
/// data fragment to merge, or an error string that becomes an
/// `EngineError::Script`. It must never be trusted to mutate anything
/// the core doesn't explicitly merge back in.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn eval(&self, script: &str, vars: &Json) -> Result<Json>;

    /// Boolean condition evaluation for gateway/flow conditions and
    /// standard-loop continuation checks.
    async fn eval_condition(&self, expr: &str, vars: &Json) -> Result<bool>;
}

/// Outbound side-effecting calls a ServiceTask/SendTask/BusinessRuleTask
/// makes into the hosting application. Kept
/// separate from `ScriptHost` because it is typically a network call,
/// not an in-process evaluation.
#[async_trait]
pub trait AppDelegate: Send + Sync {
    async fn invoke(&self, element_id: &str, input: &Json) -> Result<Json>;
}

/// A query against the model store's deployed-definition catalog: "which
/// start events are waiting to be triggered by this message/signal id".
#[derive(Clone, Debug)]
pub enum EventQuery {
    Message(String),
    Signal(String),
}

/// One start event surfaced by the model store in answer to an
/// `EventQuery`: the definition it lives in and the start node id to
/// enter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartEventMatch {
    pub definition_key: String,
    pub start_node_id: String,
}

/// Read-only external data used by event-based gateways / conditional
/// events to decide whether a condition has become true out-of-band,
/// and by the engine facade to resolve message/signal start-event
/// correlation without the core holding its own model catalog.
/// Optional: engines with no external
/// model can use `NullModelStore`.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Json>>;

    /// Start events across every deployed definition whose message/signal
    /// id matches `query`.
    async fn find_events(&self, query: &EventQuery) -> Result<Vec<StartEventMatch>>;
}

pub struct NullModelStore;

#[async_trait]
impl ModelStore for NullModelStore {
    async fn read(&self, _key: &str) -> Result<Option<Json>> {
        Ok(None)
    }

    async fn find_events(&self, _query: &EventQuery) -> Result<Vec<StartEventMatch>> {
        Ok(Vec::new())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Deterministic in-memory script host for tests: scripts are keys
    /// into a fixed table rather than a real expression language.
    pub struct StubScriptHost {
        pub responses: HashMap<String, Json>,
        pub conditions: HashMap<String, bool>,
    }

    impl StubScriptHost {
        pub fn new() -> Self {
            StubScriptHost {
                responses: HashMap::new(),
                conditions: HashMap::new(),
            }
        }

        pub fn with_response(mut self, script: impl Into<String>, value: Json) -> Self {
            self.responses.insert(script.into(), value);
            self
        }

        pub fn with_condition(mut self, expr: impl Into<String>, value: bool) -> Self {
            self.conditions.insert(expr.into(), value);
            self
        }
    }

    #[async_trait]
    impl ScriptHost for StubScriptHost {
        async fn eval(&self, script: &str, _vars: &Json) -> Result<Json> {
            Ok(self
                .responses
                .get(script)
                .cloned()
                .unwrap_or(Json::Null))
        }

        async fn eval_condition(&self, expr: &str, _vars: &Json) -> Result<bool> {
            Ok(*self.conditions.get(expr).unwrap_or(&(expr.trim() == "true")))
        }
    }

    /// Fixed message/signal → start event table, standing in for a real
    /// model store's deployed-definition catalog.
    pub struct StaticModelStore {
        pub message_starts: HashMap<String, StartEventMatch>,
        pub signal_starts: HashMap<String, Vec<StartEventMatch>>,
    }

    impl StaticModelStore {
        pub fn new() -> Self {
            StaticModelStore {
                message_starts: HashMap::new(),
                signal_starts: HashMap::new(),
            }
        }

        pub fn with_message_start(mut self, message_id: impl Into<String>, definition_key: impl Into<String>, start_node_id: impl Into<String>) -> Self {
            self.message_starts.insert(
                message_id.into(),
                StartEventMatch { definition_key: definition_key.into(), start_node_id: start_node_id.into() },
            );
            self
        }

        pub fn with_signal_start(mut self, signal_id: impl Into<String>, definition_key: impl Into<String>, start_node_id: impl Into<String>) -> Self {
            self.signal_starts.entry(signal_id.into()).or_default().push(StartEventMatch {
                definition_key: definition_key.into(),
                start_node_id: start_node_id.into(),
            });
            self
        }
    }

    #[async_trait]
    impl ModelStore for StaticModelStore {
        async fn read(&self, _key: &str) -> Result<Option<Json>> {
            Ok(None)
        }

        async fn find_events(&self, query: &EventQuery) -> Result<Vec<StartEventMatch>> {
            Ok(match query {
                EventQuery::Message(id) => self.message_starts.get(id).cloned().into_iter().collect(),
                EventQuery::Signal(id) => self.signal_starts.get(id).cloned().unwrap_or_default(),
            })
        }
    }

    /// Records every invocation so tests can assert on call order.
    pub struct RecordingAppDelegate {
        pub calls: Mutex<Vec<(String, Json)>>,
        pub reply: Json,
    }

    impl RecordingAppDelegate {
        pub fn new(reply: Json) -> Self {
            RecordingAppDelegate {
                calls: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    #[async_trait]
    impl AppDelegate for RecordingAppDelegate {
        async fn invoke(&self, element_id: &str, input: &Json) -> Result<Json> {
            self.calls
                .lock()
                .await
                .push((element_id.to_string(), input.clone()));
            Ok(self.reply.clone())
        }
    }
}
