use async_trait::async_trait;
use hfsm_core::{CompletionSink, InvocationHandle, Outcome, Plugin};
use hfsm_value::Value;

/// Synchronous test/demo binding: wraps the invoke state's endpoint payload
/// as `{ result: <endpoint> }` and reports success immediately, without
/// touching the network or any other external system.
pub struct EchoPlugin;

#[async_trait]
impl Plugin for EchoPlugin {
    fn binding(&self) -> &str {
        "ECHO"
    }

    async fn invoke(&self, endpoint: Value, _input: Value, on_complete: CompletionSink) {
        let wrapped = Value::object();
        let _ = wrapped.insert_field("result", endpoint.deep_copy());
        on_complete.complete(Outcome::Success(Some(wrapped)));
    }

    async fn cancel(&self, _handle: &InvocationHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfsm_core::invoke::InvocationTracker;

    #[tokio::test]
    async fn echoes_endpoint_payload_as_result() {
        let endpoint = Value::object();
        endpoint.insert_field("ok", Value::boolean(true)).unwrap();

        let (tracker, mut rx) = InvocationTracker::new();
        let (_handle, sink) = tracker.begin();

        EchoPlugin.invoke(endpoint, Value::object(), sink).await;

        let (_, outcome) = rx.try_recv().unwrap();
        let Outcome::Success(Some(result)) = outcome else { panic!("expected success") };
        assert!(result.path_get("result.ok").unwrap().as_bool().unwrap());
    }
}
