use thiserror::Error;

use crate::types::StateId;

/// Structural violations surfaced while linking/validating a
/// [`crate::builder::Builder`]. The builder collects every applicable
/// error before failing rather than stopping at the first one.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("no root machine state was added")]
    NoRoot,

    #[error("more than one root machine state was added: {0:?}")]
    MultipleRoots(Vec<String>),

    #[error("state '{state}' references unknown parent '{parent}'")]
    UnknownParent { state: String, parent: String },

    #[error("transition '{transition}' references unknown source '{source}'")]
    UnknownSource { transition: String, source: String },

    #[error("transition '{transition}' references unknown target '{target}'")]
    UnknownTarget { transition: String, target: String },

    #[error("dataflow references unknown source state '{0}'")]
    UnknownDataflowSource(String),

    #[error("dataflow references unknown target state '{0}'")]
    UnknownDataflowTarget(String),

    #[error("duplicate state id '{0}'")]
    DuplicateId(String),

    #[error("final state '{0}' has outgoing transitions")]
    FinalHasOutgoing(String),

    #[error("composite/machine state '{state}' initial child '{initial}' is not one of its children")]
    InitialChildMissing { state: String, initial: String },

    #[error("parallel state '{0}' has no child regions")]
    EmptyParallel(String),

    #[error("state '{0}' is not reachable from the root")]
    Unreachable(String),

    #[error("invalid condition expression '{expression}': {reason}")]
    InvalidCondition { expression: String, reason: String },
}

/// Errors raised while the engine is running.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("start called on an already-running machine")]
    AlreadyRunning,

    #[error("stop/post_event called on a machine that is not running")]
    NotRunning,

    #[error("internal invariant violation: {0}")]
    Internal(String),

    #[error("unknown state id {0:?}")]
    UnknownState(StateId),
}

/// Errors from the invoke subsystem; non-fatal
/// to the machine — always routed to the owning Invoke state as
/// `error.<id>`, never propagated as a hard failure of the macrostep.
#[derive(Debug, Error, Clone)]
pub enum PluginError {
    #[error("no plugin registered for binding '{0}'")]
    UnknownBinding(String),

    #[error("plugin reported an error: {0}")]
    Reported(String),
}
