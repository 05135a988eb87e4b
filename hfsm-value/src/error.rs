use thiserror::Error;

/// Errors raised by [`crate::Value`] operations.
///
/// Parse errors carry location information where the underlying format
/// library supplies it; type access errors are recoverable at the call
/// site.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("invalid path segment in {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("array index {index} out of range (len {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Undefined cannot be serialized")]
    UndefinedNotSerializable,

    #[error("would create a cyclic value reference")]
    CycleDetected,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML structure error: {0}")]
    XmlStructure(String),
}

pub type ValueResult<T> = Result<T, ValueError>;
