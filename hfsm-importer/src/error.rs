use thiserror::Error;

/// A description could not be decoded into a [`crate::dto::MachineDto`].
/// Carries whatever location information the underlying format library
/// supplies; fatal to the request, the machine is never built.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("xml: {0}")]
    Xml(String),

    #[error("value conversion: {0}")]
    Value(#[from] hfsm_value::ValueError),

    #[error("root element must be a statemachine")]
    RootNotMachine,

    #[error("build failed with {} error(s): {}", .0.len(), .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Build(Vec<hfsm_core::BuildError>),
}
