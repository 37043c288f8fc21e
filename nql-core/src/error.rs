//! Error types for the nQL engine.
//!
//! The propagation policy from the spec is deliberately narrow: parse failures carry
//! a message, evaluation-time problems (missing fields, bad regex, OOM-on-update)
//! degrade to a boolean/false rather than raising, and lifecycle violations are their
//! own variant so callers can distinguish "you used the API wrong" from "the query
//! text was bad".

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// nQL or predicate text failed to parse. The message points at what was expected.
    #[error("parse error: {0}")]
    Parse(String),

    /// A world lifecycle method was called out of order (start before open, run
    /// before start, etc). No state changes on this error.
    #[error("loop lifecycle violation: {0}")]
    LoopLifecycle(&'static str),

    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("yaml error: {0}")]
    Yaml(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<serde_yaml::Error> for EngineError {
    fn from(e: serde_yaml::Error) -> Self {
        EngineError::Yaml(e.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}
