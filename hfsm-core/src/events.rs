use hfsm_value::Value;

/// Dispatch priority for a posted event.
/// `High` is drained before any pending `Normal` event on every dispatch
/// step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    High,
    Normal,
}

/// A user-posted named event, or an internal completion event
/// (`done.<id>`/`error.<id>`).
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub message: Option<Value>,
    pub origin: Option<String>,
    pub priority: Priority,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Event {
            name: name.into(),
            message: None,
            origin: None,
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_message(mut self, message: Value) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn done(state_id: &str) -> Self {
        Event::new(format!("done.{state_id}"))
    }

    pub fn error(state_id: &str) -> Self {
        Event::new(format!("error.{state_id}"))
    }
}

/// Opaque handle to a posted delayed event, usable to cancel it before its
/// delay elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelayedEventHandle(pub u64);
