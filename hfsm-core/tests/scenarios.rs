//! Acceptance scenarios for the macrostep engine: one test per named
//! behavior, built directly against [`Builder`]/[`Engine`] the way a
//! caller outside this crate would assemble a machine.

use std::time::Duration;

use async_trait::async_trait;
use hfsm_core::{
    Builder, CompletionSink, DataflowSpec, Engine, Event, InvocationHandle, Outcome, Plugin,
    PluginRegistry, Priority, StateSpec, StateSpecKind, TransitionSpec,
};
use hfsm_value::Value;

struct Echo;

#[async_trait]
impl Plugin for Echo {
    fn binding(&self) -> &str {
        "ECHO"
    }

    async fn invoke(&self, endpoint: Value, _input: Value, on_complete: CompletionSink) {
        let wrapped = Value::object();
        wrapped.insert_field("result", endpoint.deep_copy()).unwrap();
        on_complete.complete(Outcome::Success(Some(wrapped)));
    }

    async fn cancel(&self, _handle: &InvocationHandle) {}
}

struct Fail;

#[async_trait]
impl Plugin for Fail {
    fn binding(&self) -> &str {
        "FAIL"
    }

    async fn invoke(&self, _endpoint: Value, _input: Value, on_complete: CompletionSink) {
        on_complete.complete(Outcome::Error("injected failure".to_string()));
    }

    async fn cancel(&self, _handle: &InvocationHandle) {}
}

fn registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register(std::sync::Arc::new(Echo));
    registry.register(std::sync::Arc::new(Fail));
    registry
}

/// Root composite `R` (initial `A`), children `A` (leaf composite), `F`
/// (final). Transition `A -> F` on event `go`.
#[tokio::test]
async fn s1_simple_composite_transition() {
    let machine = Builder::new()
        .add_state(StateSpec::new("R", None, StateSpecKind::Machine { initial_child: Some("A".to_string()) }))
        .add_state(StateSpec::new("A", Some("R".to_string()), StateSpecKind::Composite { initial_child: None }))
        .add_state(StateSpec::new("F", Some("R".to_string()), StateSpecKind::Final))
        .add_transition(TransitionSpec::new("A", "F").on_event("go"))
        .build()
        .expect("machine should build");

    let engine = Engine::new(machine, PluginRegistry::new());
    engine.start().unwrap();
    assert!(engine.is_running());

    engine.post_event(Event::new("go")).unwrap();

    // A -> F -> F is Final, so R (the machine root) finishes and the
    // engine stops itself.
    assert!(!engine.is_running());
    assert!(engine.active_configuration().is_empty());
}

/// Parallel `P` with regions `X` (initial `X1`) and `Y` (initial `Y1`),
/// each with one transition to a Final on its own event. `P -> F` fires on
/// `done.P` only once both regions have finished.
#[tokio::test]
async fn s2_parallel_join() {
    let machine = Builder::new()
        .add_state(StateSpec::new("R", None, StateSpecKind::Machine { initial_child: Some("P".to_string()) }))
        .add_state(StateSpec::new("P", Some("R".to_string()), StateSpecKind::Parallel))
        .add_state(StateSpec::new("X", Some("P".to_string()), StateSpecKind::Composite { initial_child: Some("X1".to_string()) }))
        .add_state(StateSpec::new("X1", Some("X".to_string()), StateSpecKind::Composite { initial_child: None }))
        .add_state(StateSpec::new("Xf", Some("X".to_string()), StateSpecKind::Final))
        .add_state(StateSpec::new("Y", Some("P".to_string()), StateSpecKind::Composite { initial_child: Some("Y1".to_string()) }))
        .add_state(StateSpec::new("Y1", Some("Y".to_string()), StateSpecKind::Composite { initial_child: None }))
        .add_state(StateSpec::new("Yf", Some("Y".to_string()), StateSpecKind::Final))
        .add_state(StateSpec::new("F", Some("R".to_string()), StateSpecKind::Final))
        .add_transition(TransitionSpec::new("X1", "Xf").on_event("ex"))
        .add_transition(TransitionSpec::new("Y1", "Yf").on_event("ey"))
        .add_transition(TransitionSpec::new("P", "F").on_event("done.P"))
        .build()
        .expect("machine should build");

    let engine = Engine::new(machine, PluginRegistry::new());
    engine.start().unwrap();

    engine.post_event(Event::new("ex")).unwrap();
    assert!(engine.is_running(), "only one region finished; P is not done yet");

    engine.post_event(Event::new("ey")).unwrap();
    assert!(!engine.is_running(), "both regions finished; done.P should drive P -> F and finish the root");
}

/// In the shape of S1, a delayed `go` cancelled before it elapses must
/// never reach the queue.
#[tokio::test(start_paused = true)]
async fn s3_delayed_event_cancel() {
    let machine = Builder::new()
        .add_state(StateSpec::new("R", None, StateSpecKind::Machine { initial_child: Some("A".to_string()) }))
        .add_state(StateSpec::new("A", Some("R".to_string()), StateSpecKind::Composite { initial_child: None }))
        .add_state(StateSpec::new("F", Some("R".to_string()), StateSpecKind::Final))
        .add_transition(TransitionSpec::new("A", "F").on_event("go"))
        .build()
        .expect("machine should build");

    let engine = Engine::new(machine, PluginRegistry::new());
    engine.start().unwrap();

    let handle = engine.post_delayed(Event::new("go"), Duration::from_secs(1)).unwrap();
    tokio::time::advance(Duration::from_millis(100)).await;
    engine.cancel_delayed(handle);
    tokio::time::advance(Duration::from_secs(2)).await;

    assert!(engine.is_running());
    let a = engine.machine().find_state(engine.machine().root(), "A").unwrap();
    assert!(engine.active_configuration().contains(&a));
}

/// A single invoke state bound to `ECHO`; its endpoint is echoed back as
/// `output.result` and the machine finishes through `done.I`.
#[tokio::test]
async fn s4_invoke_success() {
    let endpoint = Value::object();
    endpoint.insert_field("ok", Value::boolean(true)).unwrap();

    let machine = Builder::new()
        .add_state(StateSpec::new("R", None, StateSpecKind::Machine { initial_child: Some("I".to_string()) }))
        .add_state(StateSpec::new(
            "I",
            Some("R".to_string()),
            StateSpecKind::Invoke { binding: "ECHO".to_string(), endpoint },
        ))
        .add_state(StateSpec::new("F", Some("R".to_string()), StateSpecKind::Final))
        .add_transition(TransitionSpec::new("I", "F").on_event("done.I"))
        .build()
        .expect("machine should build");

    let engine = Engine::new(machine, registry());
    let i = engine.machine().find_state(engine.machine().root(), "I").unwrap();

    engine.start().unwrap();
    // The invoke's completion arrives on a channel the plugin's spawned
    // task sends to; pump once to fold it into the macrostep loop.
    tokio::task::yield_now().await;
    engine.pump();

    let output = engine.machine().state(i).output.clone();
    assert!(output.path_get("result.ok").unwrap().as_bool().unwrap());
    assert!(!engine.is_running());
}

/// Same shape as S4 but bound to `FAIL`: the error transition fires
/// instead of the success one.
#[tokio::test]
async fn s5_invoke_error_routes_to_error_transition() {
    let machine = Builder::new()
        .add_state(StateSpec::new("R", None, StateSpecKind::Machine { initial_child: Some("I".to_string()) }))
        .add_state(StateSpec::new(
            "I",
            Some("R".to_string()),
            StateSpecKind::Invoke { binding: "FAIL".to_string(), endpoint: Value::object() },
        ))
        .add_state(StateSpec::new("E", Some("R".to_string()), StateSpecKind::Final))
        .add_state(StateSpec::new("F", Some("R".to_string()), StateSpecKind::Final))
        .add_transition(TransitionSpec::new("I", "E").on_event("error.I"))
        .add_transition(TransitionSpec::new("I", "F").on_event("done.I"))
        .build()
        .expect("machine should build");

    let engine = Engine::new(machine, registry());
    let e = engine.machine().find_state(engine.machine().root(), "E").unwrap();
    let f = engine.machine().find_state(engine.machine().root(), "F").unwrap();

    engine.start().unwrap();
    tokio::task::yield_now().await;
    engine.pump();

    assert!(!engine.is_running());
    // `active_configuration` is already empty by the time the root
    // finishes; what matters is which terminal state was reached, which
    // we infer from E/F never both being viable — confirmed structurally
    // by the exclusive error/done transitions above. The pre-finish log
    // is the only observable trace, so check it names E, not F.
    let entered_e = engine
        .read_log(hfsm_core::LogCursor(0))
        .iter()
        .any(|r| r.scope == "E" && r.message == "enter");
    let entered_f = engine
        .read_log(hfsm_core::LogCursor(0))
        .iter()
        .any(|r| r.scope == "F" && r.message == "enter");
    assert!(entered_e, "expected the error transition to enter E");
    assert!(!entered_f, "the success transition must not have fired");
    let _ = (e, f);
}

/// `S1` has output `{sum: 7}`; a dataflow copies it into `S2`'s
/// `input.x` by the time `S2` is entered.
#[tokio::test]
async fn s6_dataflow_copy() {
    let s1_output = Value::object();
    s1_output.insert_field("sum", Value::integer(7)).unwrap();

    let machine = Builder::new()
        .add_state(StateSpec::new("R", None, StateSpecKind::Machine { initial_child: Some("C".to_string()) }))
        .add_state(StateSpec::new("C", Some("R".to_string()), StateSpecKind::Composite { initial_child: Some("S1".to_string()) }))
        .add_state(
            StateSpec::new("S1", Some("C".to_string()), StateSpecKind::Composite { initial_child: None })
                .with_output(s1_output),
        )
        .add_state(StateSpec::new(
            "S2",
            Some("C".to_string()),
            StateSpecKind::Invoke { binding: "ECHO".to_string(), endpoint: Value::object() },
        ))
        .add_transition(TransitionSpec::new("S1", "S2").on_event("done.S1"))
        .add_dataflow(DataflowSpec::new("S1", "output.sum", "S2", "input.x"))
        .build()
        .expect("machine should build");

    let engine = Engine::new(machine, registry());
    let s2 = engine.machine().find_state(engine.machine().root(), "S2").unwrap();

    engine.start().unwrap();

    let input = engine.machine().state(s2).input.clone();
    assert_eq!(input.path_get("x").unwrap().as_i64().unwrap(), 7);
}
