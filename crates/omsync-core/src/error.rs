//! Error types for omsync core.

use thiserror::Error;

/// Errors produced while parsing or validating a property value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid boolean value: [{0}]")]
    NotABool(String),

    #[error("invalid integer value (radix {radix}): [{text}]")]
    NotANumber { text: String, radix: u32 },

    #[error("value {value} out of range [{min}, {max}]")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("character '{ch}' not one of [{valid}]")]
    NotInSet { ch: char, valid: String },

    #[error("expected a single character: [{0}]")]
    NotOneChar(String),

    #[error("index {index} out of range for [{valid}]")]
    BadIndex { index: usize, valid: String },

    #[error("reserved character {0:?} in value")]
    ReservedChar(char),

    #[error("text of {len} bytes exceeds limit of {max}")]
    TooLong { len: usize, max: usize },

    #[error("type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },
}

/// Errors from tree construction, path resolution and command handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The path does not name a node.
    #[error("node not found: [{0}]")]
    NodeNotFound(String),

    /// `=` was applied to an object.
    #[error("assignment not valid for object: {0}")]
    AssignToObject(String),

    /// A value failed type, range or membership validation.
    #[error("invalid value for {path}: {source}")]
    InvalidValue {
        path: String,
        #[source]
        source: ValueError,
    },

    #[error("empty command")]
    EmptyCommand,

    #[error("invalid command operation: [{0}]")]
    UnknownOperation(char),

    /// The tree definition is inconsistent.
    #[error("schema error: {0}")]
    Schema(String),

    #[error("schema decoding error: {0}")]
    SchemaDecode(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
