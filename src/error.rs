//! Error types for mapping-layer operations

use thiserror::Error;

/// Errors that can occur while compiling queries, resolving policies,
/// running plugins, or generating identifiers
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Clock moved backwards, refusing to generate id for [{drift_ms}ms]")]
    ClockRegression { drift_ms: i64 },

    #[error("Null argument: {0}")]
    NullArgument(String),

    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Entity not registered: {0}")]
    EntityNotFound(String),

    #[error("Plugin error: {0}")]
    Plugin(String),
}

impl MappingError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn null_argument(msg: impl Into<String>) -> Self {
        Self::NullArgument(msg.into())
    }

    pub fn invalid_predicate(msg: impl Into<String>) -> Self {
        Self::InvalidPredicate(msg.into())
    }

    pub fn entity_not_found(msg: impl Into<String>) -> Self {
        Self::EntityNotFound(msg.into())
    }

    pub fn plugin(msg: impl Into<String>) -> Self {
        Self::Plugin(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;
