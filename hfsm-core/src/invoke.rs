use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hfsm_value::Value;

use crate::error::PluginError;

/// The result a plugin reports back through `on_complete`.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(Option<Value>),
    Error(String),
}

/// A statically-registered external invoker, identified by a binding name
/// (`HTTP`, `ROS`, ...), exposing an object-safe invoke/cancel contract.
///
/// `invoke` begins the external operation and returns promptly; completion
/// is reported later through `on_complete`, which may be called from any
/// thread.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn binding(&self) -> &str;

    async fn invoke(&self, endpoint: Value, input: Value, on_complete: CompletionSink);

    /// Request cancellation of an in-flight invocation started by a prior
    /// `invoke` call. Must be idempotent and non-blocking.
    async fn cancel(&self, handle: &InvocationHandle);
}

/// Passed to a plugin's `invoke` so it can report completion exactly once,
/// from any thread, without holding a reference back into the engine.
#[derive(Clone)]
pub struct CompletionSink {
    handle: InvocationHandle,
    sender: tokio::sync::mpsc::UnboundedSender<(InvocationHandle, Outcome)>,
}

impl CompletionSink {
    pub fn complete(&self, outcome: Outcome) {
        if self.handle.cancelled.load(Ordering::Acquire) {
            return;
        }
        let _ = self.sender.send((self.handle.clone(), outcome));
    }
}

/// Bookkeeping for one in-flight invocation. Cancellation is tracked with
/// an `AtomicBool` rather than a blocking primitive so `cancel()` can be
/// non-blocking and idempotent.
#[derive(Clone)]
pub struct InvocationHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
}

impl InvocationHandle {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Suppress any completion this invocation reports from here on. Called
    /// by the engine when the owning Invoke state exits while still running.
    pub(crate) fn mark_cancelled(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl PartialEq for InvocationHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Static registry of plugins keyed by binding name.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.binding().to_string(), plugin);
    }

    pub fn get(&self, binding: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        self.plugins
            .get(binding)
            .cloned()
            .ok_or_else(|| PluginError::UnknownBinding(binding.to_string()))
    }
}

/// Issues fresh [`InvocationHandle`]s and owns the completion channel the
/// engine drains between macrosteps.
pub struct InvocationTracker {
    next_id: std::sync::atomic::AtomicU64,
    sender: tokio::sync::mpsc::UnboundedSender<(InvocationHandle, Outcome)>,
}

impl InvocationTracker {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<(InvocationHandle, Outcome)>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (
            InvocationTracker {
                next_id: std::sync::atomic::AtomicU64::new(0),
                sender,
            },
            receiver,
        )
    }

    pub fn begin(&self) -> (InvocationHandle, CompletionSink) {
        let handle = InvocationHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let sink = CompletionSink {
            handle: handle.clone(),
            sender: self.sender.clone(),
        };
        (handle, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Plugin for Echo {
        fn binding(&self) -> &str {
            "ECHO"
        }

        async fn invoke(&self, _endpoint: Value, input: Value, on_complete: CompletionSink) {
            on_complete.complete(Outcome::Success(Some(input)));
        }

        async fn cancel(&self, _handle: &InvocationHandle) {}
    }

    #[tokio::test]
    async fn registry_resolves_by_binding_name() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(Echo));
        assert!(registry.get("ECHO").is_ok());
        assert!(matches!(registry.get("NOPE"), Err(PluginError::UnknownBinding(_))));
    }

    #[tokio::test]
    async fn cancelled_invocation_suppresses_completion() {
        let (tracker, mut rx) = InvocationTracker::new();
        let (handle, sink) = tracker.begin();
        handle.cancelled.store(true, Ordering::Release);
        sink.complete(Outcome::Success(None));
        assert!(rx.try_recv().is_err());
    }
}
