use async_trait::async_trait;
use hfsm_core::{CompletionSink, InvocationHandle, Outcome, Plugin};
use hfsm_value::Value;

/// Test/demo binding that always reports failure, carrying the endpoint's
/// `message` field (or a fixed default) as the error detail. Useful for
/// exercising `error.<id>` propagation without a real external dependency.
pub struct FailPlugin;

#[async_trait]
impl Plugin for FailPlugin {
    fn binding(&self) -> &str {
        "FAIL"
    }

    async fn invoke(&self, endpoint: Value, _input: Value, on_complete: CompletionSink) {
        let message = endpoint
            .field("message")
            .and_then(|v| v.as_str().ok())
            .unwrap_or_else(|| "invocation failed".to_string());
        on_complete.complete(Outcome::Error(message));
    }

    async fn cancel(&self, _handle: &InvocationHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfsm_core::invoke::InvocationTracker;

    #[tokio::test]
    async fn always_reports_error() {
        let endpoint = Value::object();
        endpoint.insert_field("message", Value::string("boom")).unwrap();

        let (tracker, mut rx) = InvocationTracker::new();
        let (_handle, sink) = tracker.begin();

        FailPlugin.invoke(endpoint, Value::object(), sink).await;

        let (_, outcome) = rx.try_recv().unwrap();
        let Outcome::Error(message) = outcome else { panic!("expected error") };
        assert_eq!(message, "boom");
    }

    #[tokio::test]
    async fn falls_back_to_default_message() {
        let (tracker, mut rx) = InvocationTracker::new();
        let (_handle, sink) = tracker.begin();

        FailPlugin.invoke(Value::object(), Value::object(), sink).await;

        let (_, outcome) = rx.try_recv().unwrap();
        let Outcome::Error(message) = outcome else { panic!("expected error") };
        assert_eq!(message, "invocation failed");
    }
}
