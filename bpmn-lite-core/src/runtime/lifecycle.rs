//! Node lifecycle protocol: enter → assign/validate →
//! start → (wait | run) → end → go_next. Each step emits its
//! `RuntimeEvent` and the outcome of every behavior attached to the
//! node is folded with `behavior::max_action` before the next step is
//! taken, so a single `Wait`/`Error`/`Abort` from any one behavior
//! always wins over a more permissive sibling.

use crate::behavior::{
    self, error_escalation, io as io_behavior, loop_char, message, script as script_behavior, signal,
    terminate, timer, Action, BehaviorContext,
};
use crate::error::{EngineError, LookupResult, Result};
use crate::events::RuntimeEvent;
use crate::external::{AppDelegate, ScriptHost};
use crate::model::definition::Definition;
use crate::model::node::{LoopCharacteristics, Node, NodeKind};
use crate::runtime::execution::{Execution, Item, ItemStatus, LoopInstance, Token, TokenStatus};
use crate::runtime::{errorprop, gateway, subprocess, termination};
use crate::types::Id;

/// Place a token on `node_id` and run its `enter` step. Creates the
/// `Item`, evaluates the node's catching behaviors, and either parks
/// the item/token in `Waiting` or immediately runs it to completion.
pub async fn enter_node(
    def: &Definition,
    exec: &mut Execution,
    token_id: Id,
    node_id: &str,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let node = def.node(node_id)?.clone();
    {
        let token = exec
            .tokens
            .get_mut(&token_id)
            .ok_or_else(|| EngineError::NotFound(format!("token {token_id}")))?;
        token.node_id = Some(node.id.clone());
    }

    let item = Item::new(token_id, node.id.clone());
    let item_id = item.id;
    exec.items.insert(item_id, item);
    exec.emit(RuntimeEvent::NodeEnter { element_id: node.id.clone(), item_id });

    let action = evaluate_catching_behaviors(exec, token_id, &node, script_host, app_delegate).await?;
    match action {
        Action::Wait => {
            set_item_status(exec, item_id, ItemStatus::Waiting);
            set_token_status(exec, token_id, TokenStatus::Waiting);
            exec.emit(RuntimeEvent::NodeWait { element_id: node.id.clone(), item_id });
            exec.emit(RuntimeEvent::TokenWait { token_id });
        }
        Action::Continue => {
            run_item(def, exec, item_id, script_host, app_delegate).await?;
        }
        Action::End => {
            end_item(def, exec, item_id, script_host, app_delegate).await?;
        }
        Action::Error(code) => {
            propagate_error(def, exec, token_id, error_escalation::Thrown::Error, &code)?;
        }
        Action::Abort(reason) => {
            return Err(EngineError::Validation { element_id: node.id, message: reason });
        }
    }
    Ok(())
}

/// Enter the *primary* start node of a freshly created instance. The
/// act of calling `start` already is the
/// external trigger a start event would otherwise wait for, so this
/// skips straight to `run_item`/`end_item` instead of parking the
/// token — unlike `enter_node`, which is used for every other node
/// including secondary (event sub-process) start events that do wait.
pub async fn start_root(
    def: &Definition,
    exec: &mut Execution,
    token_id: Id,
    node_id: &str,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let node = def.node(node_id)?.clone();
    {
        let token = exec
            .tokens
            .get_mut(&token_id)
            .ok_or_else(|| EngineError::NotFound(format!("token {token_id}")))?;
        token.node_id = Some(node.id.clone());
    }
    let item = Item::new(token_id, node.id.clone());
    let item_id = item.id;
    exec.items.insert(item_id, item);
    exec.emit(RuntimeEvent::NodeEnter { element_id: node.id.clone(), item_id });
    exec.emit(RuntimeEvent::TokenStart { token_id, start_node_id: node.id.clone() });
    run_item(def, exec, item_id, script_host, app_delegate).await
}

async fn evaluate_catching_behaviors(
    exec: &Execution,
    token_id: Id,
    node: &Node,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<Action> {
    let vars = exec.vars_for(token_id);
    let ctx = BehaviorContext {
        node,
        vars: &vars,
        script_host,
        app_delegate,
        now_ms: crate::types::now_ms(),
        iteration: None,
    };
    let mut action = Action::Continue;
    action = behavior::max_action(action, timer::on_enter(&ctx).action);
    action = behavior::max_action(action, message::on_enter(&ctx).action);
    action = behavior::max_action(action, signal::on_enter(&ctx).action);
    // A node with no event-definition-backed catch still waits if its
    // kind is externally invokable at all (bare UserTask/ReceiveTask,
    // secondary start events, boundary events with no sub_type set).
    if action == Action::Continue && node.can_be_invoked() {
        action = Action::Wait;
    }
    Ok(action)
}

/// Run a non-waiting item to completion: resolve IO inputs, invoke the
/// task (script/app delegate as appropriate), merge outputs, then end.
pub async fn run_item(
    def: &Definition,
    exec: &mut Execution,
    item_id: Id,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let (token_id, element_id) = {
        let item = exec
            .items
            .get(&item_id)
            .ok_or_else(|| EngineError::NotFound(format!("item {item_id}")))?;
        (item.token_id, item.element_id.clone())
    };
    let node = def.node(&element_id)?.clone();
    set_item_status(exec, item_id, ItemStatus::Started);
    exec.emit(RuntimeEvent::NodeStart { element_id: node.id.clone(), item_id });

    if let Some(io_spec) = &node.io_spec {
        let vars = exec.vars_for(token_id);
        exec.emit(RuntimeEvent::TransformInput { element_id: node.id.clone(), item_id });
        let resolved = io_behavior::resolve_literals(io_spec, &vars);
        let _ = resolved; // available to AppDelegate::invoke below
    }

    match node.loop_characteristics.clone() {
        Some(lc) => run_loop_instances(exec, token_id, item_id, &node, &lc, script_host, app_delegate).await?,
        None => run_task_body(exec, token_id, &node, script_host, app_delegate).await?,
    }

    if node.io_spec.is_some() || matches!(node.kind, NodeKind::ServiceTask | NodeKind::SendTask | NodeKind::BusinessRuleTask) {
        exec.emit(RuntimeEvent::TransformOutput { element_id: node.id.clone(), item_id });
    }

    end_item(def, exec, item_id, script_host, app_delegate).await
}

/// Run the node's own task body once: "start" scripts, then (for
/// ServiceTask/SendTask/BusinessRuleTask) the app delegate invocation
/// with its output merged back. Shared by the non-looping path and by
/// every iteration of a multi-instance/standard-loop activity.
async fn run_task_body(
    exec: &mut Execution,
    token_id: Id,
    node: &Node,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let vars = exec.vars_for(token_id);
    for script in script_behavior::scripts_for_step(node, "start") {
        let result = script_host.eval(script, &vars).await?;
        exec.merge_at(token_id, "", result);
    }

    if matches!(
        node.kind,
        NodeKind::ServiceTask | NodeKind::SendTask | NodeKind::BusinessRuleTask
    ) {
        let vars = exec.vars_for(token_id);
        let result = app_delegate.invoke(&node.id, &vars).await?;
        if let Some(io_spec) = &node.io_spec {
            let merged = io_behavior::resolve_literal_outputs(io_spec, &result);
            exec.merge_at(token_id, "", merged);
        } else {
            exec.merge_at(token_id, "", result);
        }
    }
    Ok(())
}

/// Multi-instance/standard-loop guard: runs the node's
/// task body once per collection element (sequential multi-instance,
/// against the same token) or repeatedly while its condition holds
/// (standard loop), tracked by one `LoopInstance` record. Parallel
/// multi-instance spawns one sibling `Instance` token per collection
/// element up front, each scoped to its own indexed `data_path`, so
/// every element gets its own item/token lineage rather than replaying
/// the parent's.
async fn run_loop_instances(
    exec: &mut Execution,
    token_id: Id,
    owner_item_id: Id,
    node: &Node,
    lc: &LoopCharacteristics,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let loop_id = crate::types::new_id();
    match lc {
        LoopCharacteristics::SequentialMultiInstance { collection_path, element_var } => {
            let vars = exec.vars_for(token_id);
            let elements = loop_char::resolve_collection(&vars, collection_path);
            let total = elements.len() as u32;
            exec.loops.insert(
                loop_id,
                LoopInstance {
                    id: loop_id,
                    owner_item_id,
                    total,
                    completed: 0,
                    iteration: 0,
                    child_token_ids: Vec::new(),
                    is_parallel: false,
                },
            );
            for (i, element) in elements.into_iter().enumerate() {
                exec.merge_at(token_id, element_var, element);
                run_task_body(exec, token_id, node, script_host, app_delegate).await?;
                if let Some(loop_instance) = exec.loops.get_mut(&loop_id) {
                    loop_instance.completed += 1;
                    loop_instance.iteration = i as u32 + 1;
                }
            }
        }
        LoopCharacteristics::ParallelMultiInstance { collection_path, element_var } => {
            let vars = exec.vars_for(token_id);
            let elements = loop_char::resolve_collection(&vars, collection_path);
            let total = elements.len() as u32;

            let child_ids: Vec<Id> = (0..elements.len())
                .map(|i| {
                    let parent = &exec.tokens[&token_id];
                    let child = parent.spawn_child(&i.to_string());
                    let child_id = child.id;
                    exec.tokens.insert(child_id, child);
                    child_id
                })
                .collect();

            exec.loops.insert(
                loop_id,
                LoopInstance {
                    id: loop_id,
                    owner_item_id,
                    total,
                    completed: 0,
                    iteration: 0,
                    child_token_ids: child_ids.clone(),
                    is_parallel: true,
                },
            );

            for (i, (element, child_id)) in elements.into_iter().zip(child_ids.into_iter()).enumerate() {
                exec.merge_at(child_id, element_var, element);
                run_task_body(exec, child_id, node, script_host, app_delegate).await?;
                set_token_status(exec, child_id, TokenStatus::Ended);
                if let Some(loop_instance) = exec.loops.get_mut(&loop_id) {
                    loop_instance.completed += 1;
                    loop_instance.iteration = i as u32 + 1;
                }
            }
        }
        LoopCharacteristics::StandardLoop { condition_script, max_iterations } => {
            exec.loops.insert(
                loop_id,
                LoopInstance {
                    id: loop_id,
                    owner_item_id,
                    total: *max_iterations,
                    completed: 0,
                    iteration: 0,
                    child_token_ids: Vec::new(),
                    is_parallel: false,
                },
            );
            let mut iterations = 0u32;
            loop {
                run_task_body(exec, token_id, node, script_host, app_delegate).await?;
                iterations += 1;
                if let Some(loop_instance) = exec.loops.get_mut(&loop_id) {
                    loop_instance.completed = iterations;
                    loop_instance.iteration = iterations;
                }
                let vars = exec.vars_for(token_id);
                let condition_true = script_host.eval_condition(condition_script, &vars).await?;
                if !loop_char::should_continue_standard_loop(*max_iterations, iterations, condition_true) {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// External delivery of a waiting item (user task completion, message,
/// signal, or a fired timer). Merges the payload at the token's scope
/// and resumes the item toward `end`.
pub async fn deliver_to_waiting_item(
    def: &Definition,
    exec: &mut Execution,
    item_id: Id,
    payload: serde_json::Value,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let token_id = {
        let item = exec
            .items
            .get(&item_id)
            .ok_or_else(|| EngineError::NotFound(format!("item {item_id}")))?;
        if item.status != ItemStatus::Waiting {
            return Err(EngineError::WrongState(
                exec.instance_id,
                format!("item {item_id} is not waiting"),
            ));
        }
        item.token_id
    };
    if !payload.is_null() {
        exec.merge_at(token_id, "", payload);
    }
    set_token_status(exec, token_id, TokenStatus::Active);
    cancel_event_gateway_siblings(exec, token_id);
    end_item(def, exec, item_id, script_host, app_delegate).await
}

/// Rewind an ended instance's save point at `element_id` back to
/// `Waiting` so the facade's `restart` can redeliver to it. Picks the
/// single item for that element still in a terminal status; more than
/// one candidate (e.g. a looped activity that ran more than once) is
/// an ambiguous restart target, same as an ambiguous `invoke`.
pub fn reopen_for_restart(exec: &mut Execution, element_id: &str) -> Result<Id> {
    let matches: Vec<Id> = exec
        .items
        .values()
        .filter(|it| it.element_id == element_id && matches!(it.status, ItemStatus::Ended | ItemStatus::Terminated))
        .map(|it| it.id)
        .collect();
    let item_id = LookupResult::from_vec(matches).into_single(element_id)?;
    let token_id = exec.items[&item_id].token_id;
    set_item_status(exec, item_id, ItemStatus::Waiting);
    set_token_status(exec, token_id, TokenStatus::Waiting);
    Ok(item_id)
}

/// When the delivered item's token was one branch of an event-based
/// gateway split, every sibling branch loses the race: terminate their
/// still-waiting catch items and tokens.
fn cancel_event_gateway_siblings(exec: &mut Execution, winner_token_id: Id) {
    let Some(origin) = exec.tokens.get(&winner_token_id).and_then(|t| t.origin_item_id) else {
        return;
    };
    let sibling_ids: Vec<Id> = exec
        .tokens
        .values()
        .filter(|t| t.origin_item_id == Some(origin) && t.id != winner_token_id)
        .map(|t| t.id)
        .collect();
    for sibling_id in sibling_ids {
        let item_ids: Vec<Id> = exec
            .items
            .values()
            .filter(|it| it.token_id == sibling_id && it.status == ItemStatus::Waiting)
            .map(|it| it.id)
            .collect();
        for waiting_item_id in item_ids {
            let element_id = exec.items[&waiting_item_id].element_id.clone();
            set_item_status(exec, waiting_item_id, ItemStatus::Terminated);
            exec.emit(RuntimeEvent::NodeTerminated { element_id, item_id: waiting_item_id });
        }
        set_token_status(exec, sibling_id, TokenStatus::Terminated);
        exec.emit(RuntimeEvent::TokenTerminated { token_id: sibling_id });
    }
}

async fn end_item(
    def: &Definition,
    exec: &mut Execution,
    item_id: Id,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let (token_id, element_id) = {
        let item = exec.items.get(&item_id).expect("item must exist");
        (item.token_id, item.element_id.clone())
    };
    let node = def.node(&element_id)?.clone();

    if terminate::is_terminate(&node) {
        set_item_status(exec, item_id, ItemStatus::Ended);
        termination::terminate_instance(exec);
        return Ok(());
    }

    if let Some((thrown, code)) = error_escalation::thrown_by(&node) {
        set_item_status(exec, item_id, ItemStatus::Ended);
        exec.emit(RuntimeEvent::NodeEnd { element_id: node.id.clone(), item_id, cancel: false });
        return propagate_error(def, exec, token_id, thrown, &code);
    }

    set_item_status(exec, item_id, ItemStatus::Ended);
    exec.emit(RuntimeEvent::NodeEnd { element_id: node.id.clone(), item_id, cancel: false });

    go_next(def, exec, token_id, &node, script_host, app_delegate).await
}

/// Advance a token past a completed node: sub-process entry, gateway
/// split/spawn, or a plain single-successor hop. Ending at a node with
/// no outbound flows ends the token.
async fn go_next(
    def: &Definition,
    exec: &mut Execution,
    token_id: Id,
    node: &Node,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    if node.kind.is_sub_process_like() {
        let child_id = subprocess::enter(def, exec, token_id, node)?;
        return Box::pin(step_until_wait(def, exec, child_id, script_host, app_delegate)).await;
    }

    let vars = exec.vars_for(token_id);
    let outcome = gateway::split(def, node, |expr| {
        behavior::eval_condition_literal(expr, &vars)
    });

    if outcome.taken_flow_ids.is_empty() {
        // No outbound flow: either a genuine end event, or leaving a
        // sub-process back to its parent token.
        set_token_status(exec, token_id, TokenStatus::Ended);
        exec.emit(RuntimeEvent::TokenEnd { token_id });
        if let Some(parent_id) = exec.tokens[&token_id].parent_token_id {
            if let Some(container_id) = subprocess::leave(exec, parent_id) {
                let container = def.node(&container_id)?.clone();
                return Box::pin(go_next(def, exec, parent_id, &container, script_host, app_delegate)).await;
            }
        }
        termination::end_instance_if_complete(exec);
        return Ok(());
    }

    let targets: Vec<(String, String)> = outcome
        .taken_flow_ids
        .iter()
        .filter_map(|fid| def.flow(fid))
        .map(|f| (f.id.clone(), f.target.clone()))
        .collect();

    if targets.len() == 1 {
        let (flow_id, target) = targets[0].clone();
        exec.emit(RuntimeEvent::FlowTake { flow_id, from: node.id.clone(), to: target.clone() });
        return Box::pin(step_into(def, exec, token_id, &target, script_host, app_delegate)).await;
    }

    // Parallel/inclusive/event-based split: original token continues on
    // the first branch, a fresh sibling token per remaining branch.
    let is_event_gateway = node.kind == NodeKind::EventBasedGateway;
    let origin_item_id = if is_event_gateway {
        exec.items
            .values()
            .find(|it| it.token_id == token_id && it.element_id == node.id && it.status == ItemStatus::Ended)
            .map(|it| it.id)
    } else {
        None
    };

    let base_token = exec.tokens[&token_id].clone();
    for (flow_id, target) in targets.iter().skip(1) {
        exec.emit(RuntimeEvent::FlowTake {
            flow_id: flow_id.clone(),
            from: node.id.clone(),
            to: target.clone(),
        });
        let mut sibling = base_token.spawn_child("");
        sibling.origin_item_id = origin_item_id;
        let sibling_id = sibling.id;
        exec.tokens.insert(sibling_id, sibling);
        Box::pin(step_into(def, exec, sibling_id, target, script_host, app_delegate)).await?;
    }
    if let Some(origin) = origin_item_id {
        if let Some(token) = exec.tokens.get_mut(&token_id) {
            token.origin_item_id = Some(origin);
        }
    }
    let (flow_id, target) = targets[0].clone();
    exec.emit(RuntimeEvent::FlowTake { flow_id, from: node.id.clone(), to: target.clone() });
    Box::pin(step_into(def, exec, token_id, &target, script_host, app_delegate)).await
}

/// Move a token onto `target`, handling converging gateways: a token
/// arriving at one parks until `gateway::can_converge` says the rest
/// can no longer arrive, then the instance continues with one token.
async fn step_into(
    def: &Definition,
    exec: &mut Execution,
    token_id: Id,
    target: &str,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    let target_node = def.node(target)?.clone();
    if gateway::is_converging(&target_node) {
        set_token_status(exec, token_id, TokenStatus::Waiting);
        {
            let token = exec.tokens.get_mut(&token_id).expect("token must exist");
            token.node_id = Some(target_node.id.clone());
        }
        let arrived: Vec<Id> = exec
            .tokens
            .values()
            .filter(|t| t.node_id.as_deref() == Some(target) && t.status == TokenStatus::Waiting)
            .map(|t| t.id)
            .collect();
        let others: Vec<(Id, String)> = exec
            .active_tokens()
            .iter()
            .filter(|t| !arrived.contains(&t.id))
            .map(|t| (t.id, t.node_id.clone().unwrap_or_default()))
            .collect();
        let others_ref: Vec<(Id, &str)> = others.iter().map(|(id, n)| (*id, n.as_str())).collect();
        if gateway::can_converge(def, target, &arrived, &others_ref) {
            for id in &arrived {
                if *id != token_id {
                    set_token_status(exec, *id, TokenStatus::Ended);
                }
            }
            set_token_status(exec, token_id, TokenStatus::Active);
            return Box::pin(enter_node(def, exec, token_id, target, script_host, app_delegate)).await;
        }
        return Ok(());
    }
    Box::pin(enter_node(def, exec, token_id, target, script_host, app_delegate)).await
}

/// Keep running a token forward until it either waits or the instance
/// ends — used when entering a sub-process's first node.
async fn step_until_wait(
    def: &Definition,
    exec: &mut Execution,
    token_id: Id,
    script_host: &dyn ScriptHost,
    app_delegate: &dyn AppDelegate,
) -> Result<()> {
    // A sub-process's own start node is triggered implicitly by the
    // parent token entering the container, not by an external caller,
    // so it runs through `start_root` rather than waiting on itself.
    let node_id = exec.tokens[&token_id]
        .node_id
        .clone()
        .ok_or_else(|| EngineError::NotFound(format!("token {token_id} has no node")))?;
    start_root(def, exec, token_id, &node_id, script_host, app_delegate).await
}

fn propagate_error(
    def: &Definition,
    exec: &mut Execution,
    token_id: Id,
    thrown: error_escalation::Thrown,
    code: &str,
) -> Result<()> {
    let stack = exec.activity_stack(token_id).to_vec();
    match errorprop::find_catcher(def, &stack, thrown, code) {
        Some(catcher_id) => {
            let catcher = def.node(&catcher_id)?.clone();
            if catcher.kind == NodeKind::BoundaryEvent {
                if let Some(host_token_id) = exec.tokens[&token_id].parent_token_id {
                    if catcher.cancel_activity {
                        crate::runtime::boundary::cancel_subtree(exec, host_token_id);
                    }
                    let host_token = exec.tokens[&host_token_id].clone();
                    let boundary_token = crate::runtime::boundary::spawn_boundary_token(&host_token, &catcher);
                    exec.tokens.insert(boundary_token.id, boundary_token);
                }
            }
            exec.emit(RuntimeEvent::ProcessError { instance_id: exec.instance_id, code: code.to_string(), handled: true });
            Ok(())
        }
        None => {
            exec.emit(RuntimeEvent::ProcessError { instance_id: exec.instance_id, code: code.to_string(), handled: false });
            termination::terminate_instance(exec);
            Err(EngineError::UnhandledBpmnError { instance_id: exec.instance_id, code: code.to_string() })
        }
    }
}

fn set_item_status(exec: &mut Execution, item_id: Id, status: ItemStatus) {
    if let Some(item) = exec.items.get_mut(&item_id) {
        item.status = status;
        if status == ItemStatus::Ended {
            item.ended_at = Some(crate::types::now_ms());
        }
    }
}

fn set_token_status(exec: &mut Execution, token_id: Id, status: TokenStatus) {
    if let Some(token) = exec.tokens.get_mut(&token_id) {
        token.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::test_support::{RecordingAppDelegate, StubScriptHost};
    use crate::model::definition::{load_definition, ParsedElement, ParsedTree};
    use crate::types::new_id;
    use serde_json::json;

    fn linear_def() -> Definition {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "start".into(), tag: "startEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "task1".into(), tag: "serviceTask".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "end".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "f1".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("start".into()), target_ref: Some("task1".into()), ..Default::default() },
                ParsedElement { id: "f2".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("task1".into()), target_ref: Some("end".into()), ..Default::default() },
            ],
        };
        load_definition("p", "<xml/>", tree)
    }

    #[tokio::test]
    async fn linear_process_runs_to_completion() {
        let def = linear_def();
        let mut exec = Execution::new(new_id(), "p");
        let token = Token::new_root("P1");
        let token_id = token.id;
        exec.tokens.insert(token_id, token);

        let script_host = StubScriptHost::new();
        let app_delegate = RecordingAppDelegate::new(json!({"ok": true}));

        start_root(&def, &mut exec, token_id, "start", &script_host, &app_delegate)
            .await
            .unwrap();

        assert_eq!(exec.tokens[&token_id].status, TokenStatus::Ended);
        assert_eq!(exec.status, crate::runtime::execution::InstanceStatus::Ended);
        assert_eq!(app_delegate.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn user_task_waits_until_delivered() {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "start".into(), tag: "startEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "approve".into(), tag: "userTask".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "end".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "f1".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("start".into()), target_ref: Some("approve".into()), ..Default::default() },
                ParsedElement { id: "f2".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("approve".into()), target_ref: Some("end".into()), ..Default::default() },
            ],
        };
        let def = load_definition("p", "<xml/>", tree);
        let mut exec = Execution::new(new_id(), "p");
        let token = Token::new_root("P1");
        let token_id = token.id;
        exec.tokens.insert(token_id, token);
        let script_host = StubScriptHost::new();
        let app_delegate = RecordingAppDelegate::new(json!(null));

        start_root(&def, &mut exec, token_id, "start", &script_host, &app_delegate).await.unwrap();
        assert_eq!(exec.tokens[&token_id].status, TokenStatus::Waiting);

        let waiting_item_id = *exec
            .items
            .iter()
            .find(|(_, it)| it.element_id == "approve")
            .map(|(id, _)| id)
            .unwrap();
        deliver_to_waiting_item(&def, &mut exec, waiting_item_id, json!({"approved": true}), &script_host, &app_delegate)
            .await
            .unwrap();

        assert_eq!(exec.status, crate::runtime::execution::InstanceStatus::Ended);
    }

    #[tokio::test]
    async fn event_based_gateway_cancels_losing_branch() {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "start".into(), tag: "startEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "gw".into(), tag: "eventBasedGateway".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement {
                    id: "catchMsg".into(),
                    tag: "intermediateCatchEvent".into(),
                    process_id: "P1".into(),
                    event_definition: Some("message".into()),
                    message_id: Some("m1".into()),
                    ..Default::default()
                },
                ParsedElement {
                    id: "catchSig".into(),
                    tag: "intermediateCatchEvent".into(),
                    process_id: "P1".into(),
                    event_definition: Some("signal".into()),
                    signal_id: Some("s1".into()),
                    ..Default::default()
                },
                ParsedElement { id: "endMsg".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "endSig".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "f1".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("start".into()), target_ref: Some("gw".into()), ..Default::default() },
                ParsedElement { id: "f2".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("gw".into()), target_ref: Some("catchMsg".into()), ..Default::default() },
                ParsedElement { id: "f3".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("gw".into()), target_ref: Some("catchSig".into()), ..Default::default() },
                ParsedElement { id: "f4".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("catchMsg".into()), target_ref: Some("endMsg".into()), ..Default::default() },
                ParsedElement { id: "f5".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("catchSig".into()), target_ref: Some("endSig".into()), ..Default::default() },
            ],
        };
        let def = load_definition("p", "<xml/>", tree);
        let mut exec = Execution::new(new_id(), "p");
        let token = Token::new_root("P1");
        let token_id = token.id;
        exec.tokens.insert(token_id, token);
        let script_host = StubScriptHost::new();
        let app_delegate = RecordingAppDelegate::new(json!(null));

        start_root(&def, &mut exec, token_id, "start", &script_host, &app_delegate).await.unwrap();

        let msg_item_id = *exec
            .items
            .iter()
            .find(|(_, it)| it.element_id == "catchMsg" && it.status == ItemStatus::Waiting)
            .map(|(id, _)| id)
            .unwrap();
        let sig_item_id = *exec
            .items
            .iter()
            .find(|(_, it)| it.element_id == "catchSig" && it.status == ItemStatus::Waiting)
            .map(|(id, _)| id)
            .unwrap();
        let sig_token_id = exec.items[&sig_item_id].token_id;

        deliver_to_waiting_item(&def, &mut exec, msg_item_id, json!(null), &script_host, &app_delegate)
            .await
            .unwrap();

        assert_eq!(exec.items[&sig_item_id].status, ItemStatus::Terminated);
        assert_eq!(exec.tokens[&sig_token_id].status, TokenStatus::Terminated);
    }

    #[tokio::test]
    async fn sequential_multi_instance_runs_once_per_element() {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "start".into(), tag: "startEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement {
                    id: "task1".into(),
                    tag: "serviceTask".into(),
                    process_id: "P1".into(),
                    loop_multi_instance: Some((false, "items".into(), "item".into())),
                    ..Default::default()
                },
                ParsedElement { id: "end".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "f1".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("start".into()), target_ref: Some("task1".into()), ..Default::default() },
                ParsedElement { id: "f2".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("task1".into()), target_ref: Some("end".into()), ..Default::default() },
            ],
        };
        let def = load_definition("p", "<xml/>", tree);
        let mut exec = Execution::new(new_id(), "p");
        exec.data = json!({"items": [1, 2, 3]});
        let token = Token::new_root("P1");
        let token_id = token.id;
        exec.tokens.insert(token_id, token);
        let script_host = StubScriptHost::new();
        let app_delegate = RecordingAppDelegate::new(json!({"ok": true}));

        start_root(&def, &mut exec, token_id, "start", &script_host, &app_delegate).await.unwrap();

        assert_eq!(app_delegate.calls.lock().await.len(), 3);
        let loop_instance = exec.loops.values().next().unwrap();
        assert_eq!(loop_instance.total, 3);
        assert_eq!(loop_instance.completed, 3);
        assert_eq!(exec.status, crate::runtime::execution::InstanceStatus::Ended);
    }

    #[tokio::test]
    async fn parallel_multi_instance_spawns_one_sibling_token_per_element() {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "start".into(), tag: "startEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement {
                    id: "task1".into(),
                    tag: "serviceTask".into(),
                    process_id: "P1".into(),
                    loop_multi_instance: Some((true, "items".into(), "item".into())),
                    ..Default::default()
                },
                ParsedElement { id: "end".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "f1".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("start".into()), target_ref: Some("task1".into()), ..Default::default() },
                ParsedElement { id: "f2".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("task1".into()), target_ref: Some("end".into()), ..Default::default() },
            ],
        };
        let def = load_definition("p", "<xml/>", tree);
        let mut exec = Execution::new(new_id(), "p");
        exec.data = json!({"items": [1, 2, 3]});
        let token = Token::new_root("P1");
        let token_id = token.id;
        exec.tokens.insert(token_id, token);
        let script_host = StubScriptHost::new();
        let app_delegate = RecordingAppDelegate::new(json!({"ok": true}));

        start_root(&def, &mut exec, token_id, "start", &script_host, &app_delegate).await.unwrap();

        assert_eq!(app_delegate.calls.lock().await.len(), 3);
        let loop_instance = exec.loops.values().next().unwrap();
        assert!(loop_instance.is_parallel);
        assert_eq!(loop_instance.total, 3);
        assert_eq!(loop_instance.completed, 3);
        assert_eq!(loop_instance.child_token_ids.len(), 3);
        for child_id in &loop_instance.child_token_ids {
            assert_eq!(exec.tokens[child_id].status, TokenStatus::Ended);
            assert_eq!(exec.tokens[child_id].parent_token_id, Some(token_id));
        }
        assert_eq!(exec.data["items"], json!([1, 2, 3]));
        assert_eq!(exec.tokens[&token_id].status, TokenStatus::Ended);
        assert_eq!(exec.status, crate::runtime::execution::InstanceStatus::Ended);
    }

    #[tokio::test]
    async fn standard_loop_stops_at_max_iterations() {
        let tree = ParsedTree {
            process_name: "p".into(),
            root_process_id: "P1".into(),
            elements: vec![
                ParsedElement { id: "start".into(), tag: "startEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement {
                    id: "task1".into(),
                    tag: "serviceTask".into(),
                    process_id: "P1".into(),
                    loop_standard: Some(("true".into(), 4)),
                    ..Default::default()
                },
                ParsedElement { id: "end".into(), tag: "endEvent".into(), process_id: "P1".into(), ..Default::default() },
                ParsedElement { id: "f1".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("start".into()), target_ref: Some("task1".into()), ..Default::default() },
                ParsedElement { id: "f2".into(), tag: "sequenceFlow".into(), process_id: "P1".into(), source_ref: Some("task1".into()), target_ref: Some("end".into()), ..Default::default() },
            ],
        };
        let def = load_definition("p", "<xml/>", tree);
        let mut exec = Execution::new(new_id(), "p");
        let token = Token::new_root("P1");
        let token_id = token.id;
        exec.tokens.insert(token_id, token);
        let script_host = StubScriptHost::new();
        let app_delegate = RecordingAppDelegate::new(json!({"ok": true}));

        start_root(&def, &mut exec, token_id, "start", &script_host, &app_delegate).await.unwrap();

        assert_eq!(app_delegate.calls.lock().await.len(), 4);
        let loop_instance = exec.loops.values().next().unwrap();
        assert_eq!(loop_instance.completed, 4);
    }
}
