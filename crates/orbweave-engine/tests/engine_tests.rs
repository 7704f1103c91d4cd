//! Tests for orbweave-engine: action registry and execution flow

use orbweave_core::*;
use orbweave_engine::*;
use orbweave_web::ThreadStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn executable_thread(steps: Vec<PlanStep>) -> Thread {
    let mut thread = Thread::new(
        ThreadId::new(format!("thr-{}", uuid::Uuid::new_v4())),
        NodeRef::service("svc"),
        vec![NodeRef::channel("ops")],
        ThreadKind::Triage,
        Payload::empty(),
        Priority::Medium,
    );
    thread.executable = true;
    thread.template_id = Some("tpl".into());
    thread.plan = Some(ExecutionPlan::new(steps));
    thread
}

fn engine_with(actions: ActionRegistry) -> (Arc<ThreadStore>, ExecutionEngine) {
    let store = Arc::new(ThreadStore::new());
    let engine = ExecutionEngine::new(store.clone(), Arc::new(actions));
    (store, engine)
}

// ===========================================================================
// ActionRegistry
// ===========================================================================

#[tokio::test]
async fn registry_resolves_by_name() {
    let registry = ActionRegistry::new();
    registry.register(FnAction::new("echo", |params, _target| async move {
        Ok(params)
    }));

    let out = registry
        .run("echo", &json!({"x": 1}), &NodeRef::channel("ops"))
        .await
        .unwrap();
    assert_eq!(out, json!({"x": 1}));
}

#[tokio::test]
async fn unregistered_name_is_typed_failure() {
    let registry = ActionRegistry::new();
    let err = registry
        .run("missing", &Value::Null, &NodeRef::channel("ops"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAction(name) if name == "missing"));
}

#[tokio::test]
async fn register_replaces_same_name() {
    let registry = ActionRegistry::new();
    registry.register(FnAction::new("post", |_, _| async { Ok(json!("old")) }));
    registry.register(FnAction::new("post", |_, _| async { Ok(json!("new")) }));
    assert_eq!(registry.len(), 1);

    let out = registry
        .run("post", &Value::Null, &NodeRef::channel("ops"))
        .await
        .unwrap();
    assert_eq!(out, json!("new"));
}

// ===========================================================================
// ExecutionEngine — happy path
// ===========================================================================

#[tokio::test]
async fn steps_run_in_ascending_order() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let registry = ActionRegistry::new();
    let seen = calls.clone();
    registry.register(FnAction::new("mark", move |params, _target| {
        let seen = seen.clone();
        async move {
            seen.lock().unwrap().push(params["n"].as_u64().unwrap());
            Ok(Value::Null)
        }
    }));

    let target = NodeRef::channel("ops");
    let thread = executable_thread(vec![
        PlanStep::new("mark", target.clone(), json!({"n": 3}), 3),
        PlanStep::new("mark", target.clone(), json!({"n": 1}), 1),
        PlanStep::new("mark", target, json!({"n": 2}), 2),
    ]);
    let id = thread.id.clone();

    let (store, engine) = engine_with(registry);
    store.insert(thread);

    let report = engine.execute(&id).await.unwrap();
    assert!(report.success);
    assert_eq!(*calls.lock().unwrap(), vec![1, 2, 3]);
    assert_eq!(store.get(&id).unwrap().status, ThreadStatus::Completed);
}

#[tokio::test]
async fn all_success_completes_thread() {
    let registry = ActionRegistry::new();
    registry.register(FnAction::noop("post"));

    let target = NodeRef::channel("ops");
    let thread = executable_thread(vec![
        PlanStep::new("post", target.clone(), Value::Null, 1),
        PlanStep::new("post", target, Value::Null, 2),
    ]);
    let id = thread.id.clone();
    let (store, engine) = engine_with(registry);
    store.insert(thread);

    let report = engine.execute(&id).await.unwrap();
    assert!(report.success);
    assert!(report.error.is_none());
    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(|r| r.success));
    assert_eq!(store.get(&id).unwrap().status, ThreadStatus::Completed);
    assert_eq!(engine.executions(), 1);
    assert_eq!(engine.success_rate(), 1.0);
}

// ===========================================================================
// ExecutionEngine — failure containment
// ===========================================================================

#[tokio::test]
async fn failure_skips_remaining_steps_and_keeps_partials() {
    let later_ran = Arc::new(AtomicUsize::new(0));
    let registry = ActionRegistry::new();
    registry.register(FnAction::noop("post"));
    registry.register(FnAction::new("explode", |_, _| async {
        Err(Error::action_failed("explode", "boom"))
    }));
    let counter = later_ran.clone();
    registry.register(FnAction::new("after", move |_, _| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }));

    let target = NodeRef::channel("ops");
    let thread = executable_thread(vec![
        PlanStep::new("post", target.clone(), Value::Null, 1),
        PlanStep::new("explode", target.clone(), Value::Null, 2),
        PlanStep::new("after", target, Value::Null, 3),
    ]);
    let id = thread.id.clone();
    let (store, engine) = engine_with(registry);
    store.insert(thread);

    let report = engine.execute(&id).await.unwrap();
    assert!(!report.success);
    assert_eq!(report.results.len(), 2);
    assert!(report.results[0].success);
    assert!(!report.results[1].success);
    assert_eq!(later_ran.load(Ordering::SeqCst), 0);
    assert_eq!(store.get(&id).unwrap().status, ThreadStatus::Failed);
}

#[tokio::test]
async fn unknown_action_fails_only_its_thread() {
    let registry = ActionRegistry::new();
    registry.register(FnAction::noop("post"));

    let target = NodeRef::channel("ops");
    let bad = executable_thread(vec![PlanStep::new("nope", target.clone(), Value::Null, 1)]);
    let good = executable_thread(vec![PlanStep::new("post", target, Value::Null, 1)]);
    let (bad_id, good_id) = (bad.id.clone(), good.id.clone());

    let (store, engine) = engine_with(registry);
    store.insert(bad);
    store.insert(good);

    let report = engine.execute(&bad_id).await.unwrap();
    assert!(!report.success);
    assert!(report.error.as_deref().unwrap_or("").contains("unknown action"));
    assert_eq!(store.get(&bad_id).unwrap().status, ThreadStatus::Failed);

    // Sibling thread is untouched and still runs.
    let report = engine.execute(&good_id).await.unwrap();
    assert!(report.success);
}

// ===========================================================================
// ExecutionEngine — terminal threads
// ===========================================================================

#[tokio::test]
async fn terminal_threads_are_no_ops() {
    let registry = ActionRegistry::new();
    registry.register(FnAction::noop("post"));

    let thread = executable_thread(vec![PlanStep::new(
        "post",
        NodeRef::channel("ops"),
        Value::Null,
        1,
    )]);
    let id = thread.id.clone();
    let (store, engine) = engine_with(registry);
    store.insert(thread);

    engine.execute(&id).await.unwrap();
    let after_first = store.get(&id).unwrap();
    assert_eq!(after_first.status, ThreadStatus::Completed);

    let err = engine.execute(&id).await.unwrap_err();
    assert!(matches!(err, Error::NotExecutable { .. }));
    let after_second = store.get(&id).unwrap();
    assert_eq!(after_second.status, ThreadStatus::Completed);
    assert_eq!(after_second.updated_at, after_first.updated_at);
    assert_eq!(engine.executions(), 1);
}

#[tokio::test]
async fn non_executable_thread_is_rejected() {
    let registry = ActionRegistry::new();
    let mut thread = executable_thread(vec![]);
    thread.executable = false;
    let id = thread.id.clone();
    let (store, engine) = engine_with(registry);
    store.insert(thread);

    let err = engine.execute(&id).await.unwrap_err();
    assert!(matches!(err, Error::NotExecutable { .. }));
}

#[tokio::test]
async fn missing_thread_is_typed_error() {
    let (_store, engine) = engine_with(ActionRegistry::new());
    let err = engine.execute(&ThreadId::new("thr-ghost")).await.unwrap_err();
    assert!(matches!(err, Error::ThreadNotFound(_)));
}
