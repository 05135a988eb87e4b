//! Integration tests: exercise the full HFSM lifecycle through the gRPC
//! service facade — Load → Start → (invoke runs) → PostEvent/SubscribeLog →
//! Stop/Unload. The handlers are thin wrappers around `hfsm_core::Engine`, so
//! driving them with proto-shaped requests validates the whole stack.

use std::time::Duration;

use tokio_stream::StreamExt;
use tonic::{Code, Request};

use hfsm_server::grpc::proto::hfsm_server::Hfsm;
use hfsm_server::grpc::proto::{
    CancelDelayedRequest, Format, LoadRequest, Priority, PostEventRequest, StartRequest,
    StopRequest, SubscribeLogRequest, UnloadRequest,
};
use hfsm_server::grpc::HfsmService;

const ECHO_MACHINE: &str = r#"
kind: statemachine
id: R
initial: I
childs:
  - kind: invoke
    id: I
    endpoint:
      binding: ECHO
      ok: true
    transitions:
      - target: F
        event: done.I
  - kind: final
    id: F
"#;

const FAIL_MACHINE: &str = r#"
kind: statemachine
id: R
initial: I
childs:
  - kind: invoke
    id: I
    endpoint:
      binding: FAIL
      message: boom
    transitions:
      - target: F
        event: error.I
  - kind: final
    id: F
"#;

const IDLE_MACHINE: &str = r#"
kind: statemachine
id: R
initial: A
childs:
  - kind: composite
    id: A
    transitions:
      - target: F
        event: go
  - kind: final
    id: F
"#;

async fn load(service: &HfsmService, description: &str) -> String {
    service
        .load(Request::new(LoadRequest {
            format: Format::Yaml as i32,
            description: description.to_string(),
        }))
        .await
        .expect("load should succeed")
        .into_inner()
        .machine_id
}

#[tokio::test]
async fn echo_invoke_runs_machine_to_completion() {
    let service = HfsmService::new();
    let machine_id = load(&service, ECHO_MACHINE).await;

    service
        .start(Request::new(StartRequest { machine_id: machine_id.clone() }))
        .await
        .expect("start should succeed");

    tokio::time::sleep(Duration::from_millis(150)).await;

    // The invoke completed, fired its transition to Final, and Final
    // exiting the root machine state auto-stopped the engine.
    let err = service
        .stop(Request::new(StopRequest { machine_id: machine_id.clone() }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);

    service
        .unload(Request::new(UnloadRequest { machine_id }))
        .await
        .expect("unload should succeed");
}

#[tokio::test]
async fn fail_invoke_routes_through_error_event() {
    let service = HfsmService::new();
    let machine_id = load(&service, FAIL_MACHINE).await;

    service
        .start(Request::new(StartRequest { machine_id: machine_id.clone() }))
        .await
        .expect("start should succeed");

    tokio::time::sleep(Duration::from_millis(150)).await;

    let err = service
        .stop(Request::new(StopRequest { machine_id: machine_id.clone() }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
}

#[tokio::test]
async fn post_event_drives_a_waiting_composite_to_final() {
    let service = HfsmService::new();
    let machine_id = load(&service, IDLE_MACHINE).await;

    service
        .start(Request::new(StartRequest { machine_id: machine_id.clone() }))
        .await
        .unwrap();

    service
        .post_event(Request::new(PostEventRequest {
            machine_id: machine_id.clone(),
            event_name: "go".to_string(),
            priority: Priority::Normal as i32,
            message_json: String::new(),
            delay_ms: None,
        }))
        .await
        .expect("post_event should succeed");

    let err = service
        .stop(Request::new(StopRequest { machine_id }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);
}

#[tokio::test]
async fn delayed_event_can_be_cancelled_before_it_fires() {
    let service = HfsmService::new();
    let machine_id = load(&service, IDLE_MACHINE).await;

    service
        .start(Request::new(StartRequest { machine_id: machine_id.clone() }))
        .await
        .unwrap();

    let resp = service
        .post_event(Request::new(PostEventRequest {
            machine_id: machine_id.clone(),
            event_name: "go".to_string(),
            priority: Priority::Normal as i32,
            message_json: String::new(),
            delay_ms: Some(10_000),
        }))
        .await
        .expect("post_event should succeed")
        .into_inner();
    let delayed_handle = resp.delayed_handle.expect("a delayed post returns a handle");

    service
        .cancel_delayed(Request::new(CancelDelayedRequest { machine_id: machine_id.clone(), delayed_handle }))
        .await
        .expect("cancel_delayed should succeed");

    // Still running: the cancelled delayed event never reached the queue.
    service
        .stop(Request::new(StopRequest { machine_id }))
        .await
        .expect("engine should still be running");
}

#[tokio::test]
async fn subscribe_log_observes_lifecycle_records() {
    let service = HfsmService::new();
    let machine_id = load(&service, IDLE_MACHINE).await;

    let mut stream = service
        .subscribe_log(Request::new(SubscribeLogRequest { machine_id: machine_id.clone(), cursor: 0 }))
        .await
        .expect("subscribe_log should succeed")
        .into_inner();

    service
        .start(Request::new(StartRequest { machine_id }))
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("should receive a record before the timeout")
        .expect("stream should not end")
        .expect("record should not be an error");
    assert_eq!(first.message, "machine starting");
}

#[tokio::test]
async fn operating_on_an_unknown_machine_is_not_found() {
    let service = HfsmService::new();
    let err = service
        .start(Request::new(StartRequest { machine_id: "does-not-exist".to_string() }))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}
