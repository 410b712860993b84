//! Engine facade : the only entry point hosting applications
//! call. Every mutating operation acquires the target instance's lock
//! for its duration, loads the `Execution` from cache or the store,
//! drives the lifecycle machinery, then persists the result back —
//! mirroring the established "facade owns locking + persistence, the
//! machinery underneath is lock-free" layering.

use crate::error::{EngineError, LookupResult, Result};
use crate::external::{AppDelegate, EventQuery, ModelStore, ScriptHost};
use crate::model::definition::{BpmnParser, Definition};
use crate::persistence::{DocumentStore, ExecutionCache, InstanceLocker, Query};
use crate::runtime::execution::{Execution, InstanceStatus, ItemStatus, Token};
use crate::runtime::lifecycle;
use crate::types::{new_id, Id};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

const DEFINITIONS_COLLECTION: &str = "definitions";
const INSTANCES_COLLECTION: &str = "instances";

/// What `throw_message` actually did, since "no waiting item and no
/// matching start event" is a reportable outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrowMessageOutcome {
    /// A start event with this message id matched; a new instance was
    /// created.
    Started(Id),
    /// Delivered to the single waiting item whose correlation matched.
    Invoked(Id),
    /// Neither a start event nor a waiting item matched.
    NoMatch,
}

/// What `throw_signal` did: a signal is broadcast, so both "started a
/// new instance from a matching start event" and "invoked an existing
/// waiting item" can happen in the same call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThrowSignalOutcome {
    pub started_instances: Vec<Id>,
    pub invoked_items: usize,
}

pub struct Engine {
    store: Arc<dyn DocumentStore>,
    locker: InstanceLocker,
    cache: ExecutionCache,
    script_host: Arc<dyn ScriptHost>,
    app_delegate: Arc<dyn AppDelegate>,
    model_store: Arc<dyn ModelStore>,
    definitions: RwLock<HashMap<String, Arc<Definition>>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        script_host: Arc<dyn ScriptHost>,
        app_delegate: Arc<dyn AppDelegate>,
        model_store: Arc<dyn ModelStore>,
    ) -> Self {
        Engine {
            store,
            locker: InstanceLocker::new(),
            cache: ExecutionCache::new(),
            script_host,
            app_delegate,
            model_store,
            definitions: RwLock::new(HashMap::new()),
        }
    }

    /// Definition loader & node graph. Parses, cross-links,
    /// registers under `definition_key`, and persists a durable record.
    pub async fn load_definition(
        &self,
        parser: &dyn BpmnParser,
        definition_key: &str,
        source_xml: &str,
    ) -> Result<Arc<Definition>> {
        let tree = parser.parse(source_xml)?;
        let def = crate::model::definition::load_definition(definition_key, source_xml, tree);
        let def = Arc::new(def);
        self.store
            .insert(
                DEFINITIONS_COLLECTION,
                definition_key,
                serde_json::to_value(def.as_ref()).map_err(|e| EngineError::Store(e.into()))?,
            )
            .await?;
        self.definitions
            .write()
            .await
            .insert(definition_key.to_string(), def.clone());
        info!(definition_key, node_count = def.nodes.len(), "definition loaded");
        Ok(def)
    }

    async fn definition(&self, definition_key: &str) -> Result<Arc<Definition>> {
        if let Some(def) = self.definitions.read().await.get(definition_key) {
            return Ok(def.clone());
        }
        let doc = self
            .store
            .find_one(DEFINITIONS_COLLECTION, &Query::eq("key", Json::String(definition_key.to_string())))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("definition {definition_key}")))?;
        let def: Definition = serde_json::from_value(doc.body).map_err(|e| EngineError::Store(e.into()))?;
        let def = Arc::new(def);
        self.definitions.write().await.insert(definition_key.to_string(), def.clone());
        Ok(def)
    }

    async fn load_execution(&self, instance_id: Id) -> Result<Execution> {
        if let Some(exec) = self.cache.get(instance_id).await {
            return Ok(exec);
        }
        let doc = self
            .store
            .find_one(INSTANCES_COLLECTION, &Query::eq("instance_id", Json::String(instance_id.to_string())))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("instance {instance_id}")))?;
        serde_json::from_value(doc.body).map_err(|e| EngineError::Store(e.into()))
    }

    async fn persist_execution(&self, exec: &Execution) -> Result<()> {
        let body = serde_json::to_value(exec).map_err(|e| EngineError::Store(e.into()))?;
        self.store
            .update(INSTANCES_COLLECTION, &exec.instance_id.to_string(), body)
            .await?;
        self.cache.put(exec.clone()).await;
        Ok(())
    }

    /// Start a new instance of `definition_key`. Creates the root token, runs it to its first
    /// wait point or the instance's end, and persists the result.
    pub async fn start(&self, definition_key: &str, initial_data: Json) -> Result<Id> {
        let def = self.definition(definition_key).await?;
        let start_node_id = def
            .root_process()
            .start_nodes
            .first()
            .cloned()
            .ok_or_else(|| EngineError::DefinitionLoad(format!("{definition_key} has no start node")))?;
        self.start_at(definition_key, &start_node_id, initial_data).await
    }

    /// Start a new instance of `definition_key` at a specific start
    /// node, for message/signal start-event correlation, where the
    /// triggered start event need not be the process's primary one.
    async fn start_at(&self, definition_key: &str, start_node_id: &str, initial_data: Json) -> Result<Id> {
        let def = self.definition(definition_key).await?;

        let instance_id = new_id();
        let mut exec = Execution::new(instance_id, definition_key);
        if !initial_data.is_null() {
            exec.data = initial_data;
        }
        let token = Token::new_root(def.root_process_id.clone());
        let token_id = token.id;
        exec.tokens.insert(token_id, token);
        exec.emit(crate::events::RuntimeEvent::ProcessStart { instance_id });

        let guard = self.locker.acquire(instance_id).await?;
        lifecycle::start_root(&def, &mut exec, token_id, start_node_id, self.script_host.as_ref(), self.app_delegate.as_ref())
            .await?;
        exec.emit(crate::events::RuntimeEvent::ProcessStarted { instance_id });
        self.persist_execution(&exec).await?;
        drop(guard);
        Ok(instance_id)
    }

    /// Every persisted instance, deserialized. Used by message/signal
    /// correlation to search for a matching waiting item across the
    /// whole instance population rather than just one caller-named
    /// instance.
    async fn scan_instances(&self) -> Result<Vec<Execution>> {
        let docs = self.store.find(INSTANCES_COLLECTION, &Query::All).await?;
        docs.into_iter()
            .map(|doc| serde_json::from_value(doc.body).map_err(|e| EngineError::Store(e.into())))
            .collect()
    }

    /// Deliver an external invocation to a single waiting item at
    /// `element_id` : user task completion,
    /// a receive task, or a catch event being nudged directly rather
    /// than through `signal`/`throw_message` correlation.
    pub async fn invoke(&self, instance_id: Id, element_id: &str, payload: Json) -> Result<()> {
        let guard = self.locker.acquire(instance_id).await?;
        let mut exec = self.load_execution(instance_id).await?;

        let matches: Vec<Id> = exec
            .items
            .values()
            .filter(|it| it.element_id == element_id && it.status == ItemStatus::Waiting)
            .map(|it| it.id)
            .collect();
        let item_id = LookupResult::from_vec(matches).into_single(element_id)?;

        let def = self.definition(&exec.definition_key).await?;
        exec.emit(crate::events::RuntimeEvent::ProcessInvoke { instance_id, item_id });
        lifecycle::deliver_to_waiting_item(&def, &mut exec, item_id, payload, self.script_host.as_ref(), self.app_delegate.as_ref())
            .await?;
        exec.emit(crate::events::RuntimeEvent::ProcessInvoked { instance_id, item_id });
        self.persist_execution(&exec).await?;
        drop(guard);
        Ok(())
    }

    /// Assign a waiting item to a performer without completing it
    ///  — used by UserTask
    /// claim/unclaim flows ahead of `invoke`.
    pub async fn assign(&self, instance_id: Id, element_id: &str, assignee: &str) -> Result<()> {
        let guard = self.locker.acquire(instance_id).await?;
        let mut exec = self.load_execution(instance_id).await?;
        let matches: Vec<Id> = exec
            .items
            .values()
            .filter(|it| it.element_id == element_id && it.status == ItemStatus::Waiting)
            .map(|it| it.id)
            .collect();
        let item_id = LookupResult::from_vec(matches).into_single(element_id)?;
        exec.merge_at(exec.items[&item_id].token_id, "assignee", Json::String(assignee.to_string()));
        exec.emit(crate::events::RuntimeEvent::NodeAssign { element_id: element_id.to_string(), item_id });
        self.persist_execution(&exec).await?;
        drop(guard);
        Ok(())
    }

    /// Search the model store for a start event carrying `message_id`;
    /// if one matches, start a new instance there. Otherwise search
    /// every running instance for the one waiting item whose node
    /// carries `message_id` and whose stored correlation key submatches
    /// `correlation`, and deliver to it. Ambiguous correlation is a
    /// caller error, not silently resolved to "first match"; no match
    /// at all is reported as `NoMatch`, not an error.
    pub async fn throw_message(
        &self,
        message_id: &str,
        correlation: &Json,
        payload: Json,
    ) -> Result<ThrowMessageOutcome> {
        let starts = self.model_store.find_events(&EventQuery::Message(message_id.to_string())).await?;
        if !starts.is_empty() {
            let start = LookupResult::from_vec(starts).into_single(message_id)?;
            let instance_id = self.start_at(&start.definition_key, &start.start_node_id, payload).await?;
            return Ok(ThrowMessageOutcome::Started(instance_id));
        }

        let mut candidates: Vec<(Id, Id)> = Vec::new();
        for exec in self.scan_instances().await? {
            let def = self.definition(&exec.definition_key).await?;
            if let Some(item) = exec.items.values().find(|it| {
                it.status == ItemStatus::Waiting
                    && def.node(&it.element_id).map(|n| n.message_id.as_deref() == Some(message_id)).unwrap_or(false)
                    && it.correlation_key.matches(correlation)
            }) {
                candidates.push((exec.instance_id, item.id));
            }
        }

        let (instance_id, item_id) = match LookupResult::from_vec(candidates).into_single(message_id) {
            Ok(pair) => pair,
            Err(EngineError::NotFound(_)) => return Ok(ThrowMessageOutcome::NoMatch),
            Err(e) => return Err(e),
        };

        let guard = self.locker.acquire(instance_id).await?;
        let mut exec = self.load_execution(instance_id).await?;
        let def = self.definition(&exec.definition_key).await?;

        exec.emit(crate::events::RuntimeEvent::ProcessInvoke { instance_id, item_id });
        lifecycle::deliver_to_waiting_item(&def, &mut exec, item_id, payload, self.script_host.as_ref(), self.app_delegate.as_ref())
            .await?;
        exec.emit(crate::events::RuntimeEvent::ProcessInvoked { instance_id, item_id });
        self.persist_execution(&exec).await?;
        drop(guard);
        Ok(ThrowMessageOutcome::Invoked(instance_id))
    }

    /// Broadcast a signal: start one new instance per matching start
    /// event in the model store, then invoke every currently-waiting
    /// item (across every running instance) whose node carries a
    /// matching `signal_id`.
    pub async fn throw_signal(&self, signal_id: &str, payload: Json) -> Result<ThrowSignalOutcome> {
        let mut outcome = ThrowSignalOutcome::default();

        for start in self.model_store.find_events(&EventQuery::Signal(signal_id.to_string())).await? {
            let instance_id = self.start_at(&start.definition_key, &start.start_node_id, payload.clone()).await?;
            outcome.started_instances.push(instance_id);
        }

        let instance_ids: Vec<Id> = self
            .scan_instances()
            .await?
            .into_iter()
            .map(|exec| exec.instance_id)
            .collect();

        for instance_id in instance_ids {
            let guard = self.locker.acquire(instance_id).await?;
            let mut exec = self.load_execution(instance_id).await?;
            let def = self.definition(&exec.definition_key).await?;

            let matches: Vec<Id> = exec
                .items
                .values()
                .filter(|it| it.status == ItemStatus::Waiting)
                .filter(|it| def.node(&it.element_id).map(|n| n.signal_id.as_deref() == Some(signal_id)).unwrap_or(false))
                .map(|it| it.id)
                .collect();

            if matches.is_empty() {
                drop(guard);
                continue;
            }

            for item_id in matches {
                lifecycle::deliver_to_waiting_item(&def, &mut exec, item_id, payload.clone(), self.script_host.as_ref(), self.app_delegate.as_ref())
                    .await?;
                outcome.invoked_items += 1;
            }
            self.persist_execution(&exec).await?;
            drop(guard);
        }

        Ok(outcome)
    }

    /// Rewind an ended instance to the save point at `element_id`: the
    /// execution must be in `Ended` status; flips it back to `Running`,
    /// clears `ended_at`, and signals the item there with `payload` as
    /// if it had just been delivered externally.
    pub async fn restart(&self, instance_id: Id, element_id: &str, payload: Json) -> Result<()> {
        let guard = self.locker.acquire(instance_id).await?;
        self.cache.evict(instance_id).await;
        let mut exec = self.load_execution(instance_id).await?;
        if exec.status != InstanceStatus::Ended {
            return Err(EngineError::WrongState(
                instance_id,
                format!("restart requires an ended instance, found {:?}", exec.status),
            ));
        }
        let def = self.definition(&exec.definition_key).await?;

        let item_id = lifecycle::reopen_for_restart(&mut exec, element_id)?;
        exec.status = InstanceStatus::Running;
        exec.ended_at = None;
        exec.emit(crate::events::RuntimeEvent::ProcessRestored { instance_id });

        lifecycle::deliver_to_waiting_item(&def, &mut exec, item_id, payload, self.script_host.as_ref(), self.app_delegate.as_ref())
            .await?;
        self.persist_execution(&exec).await?;
        drop(guard);
        Ok(())
    }

    /// Rebind a running instance to a different (presumably newer)
    /// definition key without replaying history. Only valid while every live token sits on a
    /// node id that still exists in the target definition — otherwise
    /// there is no sound resumption point and the caller should migrate
    /// data out-of-band instead.
    pub async fn upgrade(&self, instance_id: Id, new_definition_key: &str) -> Result<()> {
        let guard = self.locker.acquire(instance_id).await?;
        let mut exec = self.load_execution(instance_id).await?;
        let new_def = self.definition(new_definition_key).await?;

        for token in exec.tokens.values() {
            if let Some(node_id) = &token.node_id {
                if new_def.node(node_id).is_err() {
                    return Err(EngineError::Validation {
                        element_id: node_id.clone(),
                        message: format!("node not present in {new_definition_key}, cannot upgrade"),
                    });
                }
            }
        }

        exec.definition_key = new_definition_key.to_string();
        self.persist_execution(&exec).await?;
        drop(guard);
        Ok(())
    }
}
