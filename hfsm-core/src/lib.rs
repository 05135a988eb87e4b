//! Runtime core for hierarchical state machines: entities, builder,
//! macrostep execution engine, invoke subsystem, and dataflow.
//!
//! [`machine::Machine`] is the built, immutable graph; [`builder::Builder`]
//! produces one from builder-supplied state/transition/dataflow specs;
//! [`engine::Engine`] drives a `Machine` from an event queue.

pub mod builder;
pub mod condition;
pub mod engine;
pub mod error;
pub mod events;
pub mod invoke;
pub mod log;
pub mod machine;
pub mod types;

pub use builder::{Builder, DataflowSpec, StateSpec, StateSpecKind, TransitionSpec};
pub use engine::Engine;
pub use error::{BuildError, EngineError, PluginError};
pub use events::{DelayedEventHandle, Event, Priority};
pub use invoke::{CompletionSink, InvocationHandle, Outcome, Plugin, PluginRegistry};
pub use log::{Level, LogCursor, LogRecord, LogStream};
pub use machine::Machine;
pub use types::{DataflowId, StateId, TransitionId};
