// SPDX-License-Identifier: MIT

//! Integration tests for the dispatch engine and runtime
//!
//! These tests drive a full runtime through its public surface: dispatch in,
//! applied actions and diagnostics out.

use futures::stream::BoxStream;
use futures::StreamExt;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

use typeless_rs::epic::{
    Action, DiagnosticEvent, Emit, Epic, EpicError, EpicResult, MemorySink, Verbosity,
};
use typeless_rs::typeless::counter::{counter_module, CountDone, CounterState, DEFAULT_DELAY};
use typeless_rs::typeless::{ConfigLoader, EngineConfig, Module, ReducerBuilder, Runtime};

// ============================================================================
// Helpers
// ============================================================================

static TRACE_CONFIG: Lazy<EngineConfig> = Lazy::new(|| {
    ConfigLoader::parse_yaml(
        r#"
name: app
verbosity: trace
subscriber_capacity: 64
"#,
    )
    .unwrap()
});

/// Take exactly `n` actions, then check nothing else shows up
async fn exactly(actions: &mut BoxStream<'static, Action>, n: usize) -> Vec<Action> {
    let mut seen = Vec::with_capacity(n);
    for _ in 0..n {
        let next = timeout(Duration::from_secs(5), actions.next())
            .await
            .expect("timed out waiting for action")
            .expect("action stream ended");
        seen.push(next);
    }
    assert!(
        timeout(Duration::from_millis(100), actions.next())
            .await
            .is_err(),
        "unexpected extra action"
    );
    seen
}

fn kinds(actions: &[Action]) -> Vec<&str> {
    actions.iter().map(|a| a.kind().as_str()).collect()
}

fn start<S: Clone + Send + Sync + 'static>(
    initial: S,
    epic: Epic<S>,
    sink: &Arc<MemorySink>,
) -> Runtime<S> {
    Runtime::builder(initial)
        .epic(epic)
        .sink(sink.clone())
        .start()
        .unwrap()
}

// ============================================================================
// Counter Module
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_counter_start_then_done_after_delay() {
    let sink = Arc::new(MemorySink::new());
    let (module, actions) = counter_module(DEFAULT_DELAY);
    let runtime = Runtime::builder(CounterState::default())
        .module(module)
        .sink(sink.clone())
        .start()
        .unwrap();
    let mut applied = runtime.subscribe();

    let started = Instant::now();
    runtime.dispatch(actions.start_count.create(()));

    let first = applied.next().await.unwrap();
    assert!(actions.start_count.matches(&first));
    assert!(runtime.state().is_loading);

    let second = applied.next().await.unwrap();
    assert!(actions.count_done.matches(&second));
    assert_eq!(
        actions.count_done.decode(&second).unwrap(),
        CountDone { count: 1 }
    );
    assert!(started.elapsed() >= DEFAULT_DELAY);
    assert_eq!(
        *runtime.state(),
        CounterState {
            is_loading: false,
            count: 1
        }
    );

    assert!(sink.records().is_empty());
    runtime.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_counter_clicks_accumulate() {
    let (module, actions) = counter_module(Duration::from_millis(50));
    let runtime = Runtime::builder(CounterState::default())
        .module(module)
        .start()
        .unwrap();
    let mut applied = runtime.subscribe();

    for _ in 0..3 {
        runtime.dispatch(actions.start_count.create(()));
    }
    let seen = exactly(&mut applied, 6).await;

    let done = seen
        .iter()
        .filter(|a| actions.count_done.matches(a))
        .count();
    assert_eq!(done, 3);
    assert_eq!(runtime.state().count, 3);
    assert!(!runtime.state().is_loading);

    runtime.shutdown().await.unwrap();
}

// ============================================================================
// Error Isolation
// ============================================================================

#[tokio::test]
async fn test_failing_handler_does_not_affect_sibling() {
    let sink = Arc::new(MemorySink::new());
    let mut epic = Epic::<()>::new("siblings");
    epic.on_kind("go", |_, _, _| Err("boom".into()));
    epic.on_kind("go", |_, _, _| Ok(Action::new("ok").into()));

    let runtime = start((), epic, &sink);
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("go"));
    let seen = exactly(&mut applied, 2).await;
    assert_eq!(kinds(&seen), vec!["go", "ok"]);

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    match &errors[0].event {
        DiagnosticEvent::HandlerFailed { epic, source, error } => {
            assert_eq!(epic, "siblings");
            assert_eq!(source, &Action::new("go"));
            assert_eq!(error, "boom");
        }
        other => panic!("unexpected diagnostic {:?}", other),
    }

    // The pipeline keeps going after a failure
    runtime.dispatch(Action::new("go"));
    assert_eq!(kinds(&exactly(&mut applied, 2).await), vec!["go", "ok"]);
    assert_eq!(sink.errors().len(), 2);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_panicking_handler_is_contained() {
    let sink = Arc::new(MemorySink::new());
    let mut epic = Epic::<()>::new("panics");
    epic.on_kind("go", |_, _, _| -> typeless_rs::epic::HandlerResult {
        panic!("handler exploded")
    });
    epic.on_kind("go", |_, _, _| Ok(Action::new("ok").into()));

    let runtime = start((), epic, &sink);
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("go"));
    assert_eq!(kinds(&exactly(&mut applied, 2).await), vec!["go", "ok"]);

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("handler exploded"));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_and_malformed_outputs_are_dropped() {
    let sink = Arc::new(MemorySink::new());
    let mut epic = Epic::<()>::new("outputs");
    epic.on_kind("go", |_, _, _| {
        Ok(EpicResult::many(vec![
            Emit::Missing,
            Emit::Raw(json!({"kind": "not-an-action"})),
            Emit::Raw(json!({"type": "valid"})),
        ]))
    });

    let runtime = start((), epic, &sink);
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("go"));
    assert_eq!(kinds(&exactly(&mut applied, 2).await), vec!["go", "valid"]);

    let errors = sink.errors();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0].event, DiagnosticEvent::MissingAction { .. }));
    match &errors[1].event {
        DiagnosticEvent::MalformedAction { value, .. } => {
            assert_eq!(value, &json!({"kind": "not-an-action"}))
        }
        other => panic!("unexpected diagnostic {:?}", other),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_payload_is_reported_as_handler_failure() {
    let sink = Arc::new(MemorySink::new());
    let mut module = Module::<()>::new("typed");
    let done = module.action::<CountDone>("done");
    module.epic().on(&done, |_, _, _| Ok(EpicResult::Empty));

    let runtime = Runtime::builder(())
        .module(module)
        .sink(sink.clone())
        .start()
        .unwrap();
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("typed/done").with_payload(json!("nope")));
    exactly(&mut applied, 1).await;

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    let expected = EpicError::Payload {
        kind: "typed/done".to_string(),
        source: serde_json::from_value::<CountDone>(json!("nope")).unwrap_err(),
    };
    match &errors[0].event {
        DiagnosticEvent::HandlerFailed { error, .. } => assert_eq!(error, &expected.to_string()),
        other => panic!("unexpected diagnostic {:?}", other),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_panicking_reducer_does_not_stop_the_runtime() {
    let sink = Arc::new(MemorySink::new());
    let reducer = |count: &u32, action: &Action| match action.kind().as_str() {
        "bad" => panic!("reducer exploded"),
        _ => count + 1,
    };
    let runtime = Runtime::builder(0u32)
        .reducer(reducer)
        .sink(sink.clone())
        .start()
        .unwrap();
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("bad"));
    runtime.dispatch(Action::new("good"));
    assert_eq!(kinds(&exactly(&mut applied, 1).await), vec!["good"]);
    assert!(runtime.is_running());
    assert_eq!(*runtime.state(), 1);

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    match &errors[0].event {
        DiagnosticEvent::ReducerFailed { action, error } => {
            assert_eq!(action, &Action::new("bad"));
            assert_eq!(error, "reducer exploded");
        }
        other => panic!("unexpected diagnostic {:?}", other),
    }

    runtime.shutdown().await.unwrap();
}

// ============================================================================
// Routing and Composition
// ============================================================================

#[tokio::test]
async fn test_action_without_handlers_still_reaches_subscribers() {
    let sink = Arc::new(MemorySink::new());
    let runtime = start((), Epic::new("empty"), &sink);
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("nobody/listens").with_payload(json!({"x": 1})));
    let seen = exactly(&mut applied, 1).await;
    assert_eq!(seen[0].payload(), Some(&json!({"x": 1})));
    assert!(sink.records().is_empty());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_outputs_cascade_through_handlers() {
    let sink = Arc::new(MemorySink::new());
    let mut epic = Epic::<()>::new("chain");
    epic.on_kind("a", |_, _, _| Ok(Action::new("b").into()));
    epic.on_kind("b", |_, _, _| Ok(Action::new("c").into()));

    let runtime = start((), epic, &sink);
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("a"));
    assert_eq!(kinds(&exactly(&mut applied, 3).await), vec!["a", "b", "c"]);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_on_many_runs_once_per_matching_action() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut epic = Epic::<()>::new("many");
    epic.on_many(["x", "y"], move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(EpicResult::Empty)
    });

    let sink = Arc::new(MemorySink::new());
    let runtime = start((), epic, &sink);
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("x"));
    runtime.dispatch(Action::new("y"));
    runtime.dispatch(Action::new("z"));
    assert_eq!(kinds(&exactly(&mut applied, 3).await), vec!["x", "y", "z"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    runtime.shutdown().await.unwrap();
}

#[test]
fn test_attach_appends_all_handlers() {
    let mut root = Epic::<()>::new("root");
    root.on_kind("a", |_, _, _| Ok(EpicResult::Empty));

    let mut child = Epic::<()>::new("child");
    child.on_kind("a", |_, _, _| Ok(EpicResult::Empty));
    child.on_many(["b", "c"], |_, _, _| Ok(EpicResult::Empty));

    let before = root.handlers().len() + child.handlers().len();
    root.attach(child);

    assert_eq!(root.handlers().len(), before);
    let epics: Vec<&str> = root.handlers().get("a").iter().map(|e| e.epic()).collect();
    assert_eq!(epics, vec!["root", "child"]);
}

#[tokio::test]
async fn test_handlers_read_state_and_dispatch() {
    let sink = Arc::new(MemorySink::new());
    let mut epic = Epic::<Vec<String>>::new("log");
    epic.on_kind("push", |payload, deps, _| {
        let size = deps.state().len();
        if payload == Some(&Value::from("twice")) {
            deps.dispatch(Action::new("push").with_payload(json!("again")));
        }
        Ok(Action::new("size").with_payload(size.into()).into())
    });
    let reducer = ReducerBuilder::new().on_kind("push", |items: &Vec<String>, action: &Action| {
        let mut next = items.clone();
        next.extend(action.payload().and_then(Value::as_str).map(String::from));
        next
    });

    let runtime = Runtime::builder(Vec::new())
        .epic(epic)
        .reducer(reducer)
        .sink(sink.clone())
        .start()
        .unwrap();
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("push").with_payload(json!("twice")));
    let seen = exactly(&mut applied, 4).await;

    let sizes: Vec<&Value> = seen
        .iter()
        .filter(|a| a.kind().as_str() == "size")
        .filter_map(|a| a.payload())
        .collect();
    assert_eq!(sizes.len(), 2);
    assert!(sizes.contains(&&json!(1)));
    assert!(sizes.contains(&&json!(2)));
    assert_eq!(*runtime.state(), vec!["twice", "again"]);
    assert!(sink.errors().is_empty());

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_back_to_back_dispatches_see_their_own_state() {
    let sink = Arc::new(MemorySink::new());
    let mut epic = Epic::<u32>::new("observer");
    epic.on_kind("inc", |_, deps, _| {
        Ok(Action::new("seen").with_payload(json!(*deps.state())).into())
    });
    let reducer = ReducerBuilder::new().on_kind("inc", |n: &u32, _: &Action| n + 1);

    let runtime = Runtime::builder(0u32)
        .epic(epic)
        .reducer(reducer)
        .sink(sink.clone())
        .start()
        .unwrap();
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new("inc"));
    runtime.dispatch(Action::new("inc"));
    let seen = exactly(&mut applied, 4).await;

    let mut observed: Vec<u64> = seen
        .iter()
        .filter(|a| a.kind().as_str() == "seen")
        .filter_map(|a| a.payload().and_then(Value::as_u64))
        .collect();
    observed.sort();
    assert_eq!(observed, vec![1, 2]);
    assert_eq!(*runtime.state(), 2);
    assert!(sink.errors().is_empty());

    runtime.shutdown().await.unwrap();
}

// ============================================================================
// Configuration and Diagnostics
// ============================================================================

#[tokio::test]
async fn test_trace_config_records_routed_actions() {
    let sink = Arc::new(MemorySink::new());
    let mut epic = Epic::<()>::new("traced");
    epic.on_kind("go", |_, _, _| Ok(EpicResult::Empty));

    let runtime = Runtime::builder(())
        .epic(epic)
        .config(TRACE_CONFIG.clone())
        .sink(sink.clone())
        .start()
        .unwrap();
    let mut applied = runtime.subscribe();
    assert_eq!(runtime.name(), "app");

    runtime.dispatch(Action::new("go"));
    runtime.dispatch(Action::new("other"));
    exactly(&mut applied, 2).await;

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_error());
    assert_eq!(records[0].epic(), Some("traced"));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_external_dispatch_is_reported() {
    let sink = Arc::new(MemorySink::new());
    let runtime = start((), Epic::new("empty"), &sink);
    let mut applied = runtime.subscribe();

    runtime.dispatch(Action::new(""));
    runtime.dispatch(Action::new("fine"));
    assert_eq!(kinds(&exactly(&mut applied, 1).await), vec!["fine"]);

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].event, DiagnosticEvent::InvalidDispatch { .. }));

    runtime.shutdown().await.unwrap();
}

#[test]
fn test_config_defaults_and_overrides() {
    assert_eq!(TRACE_CONFIG.verbosity, Verbosity::Trace);
    assert_eq!(TRACE_CONFIG.subscriber_capacity, 64);

    let config = ConfigLoader::parse_yaml("name: other").unwrap();
    assert_eq!(config.verbosity, Verbosity::Errors);
    assert!(ConfigLoader::parse_yaml("verbosity: [1, 2]").is_err());
}
