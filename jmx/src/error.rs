//! JMX bridge error types.
//!
//! Not-found outcomes get their own variants so callers can tell "absent" apart
//! from "failed". Connection failures during batch work are carried as data on
//! the descriptor instead and never surface here.

use thiserror::Error;

pub type JmxResult<T> = Result<T, JmxError>;

#[derive(Debug, Error)]
pub enum JmxError {
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("MBean not found: {0}")]
    EntityNotFound(String),

    #[error("Attribute '{attribute}' not found on {identity}")]
    AttributeNotFound { identity: String, attribute: String },

    #[error("Operation '{operation}' not found on {identity}")]
    OperationNotFound { identity: String, operation: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("No active JMX connection available")]
    NoActiveConnection,

    #[error("Active JMX connection is not connected")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid object name '{name}': {reason}")]
    InvalidIdentity { name: String, reason: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Attribute '{attribute}' on {identity} is not writable")]
    AttributeNotWritable { identity: String, attribute: String },

    #[error("Attribute '{attribute}' on {identity} is not readable")]
    AttributeNotReadable { identity: String, attribute: String },

    #[error("Operation denied: {0}")]
    OperationDenied(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl JmxError {
    /// True for the "absent" family of outcomes.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            JmxError::ConnectionNotFound(_)
                | JmxError::EntityNotFound(_)
                | JmxError::AttributeNotFound { .. }
                | JmxError::OperationNotFound { .. }
                | JmxError::ResourceNotFound(_)
                | JmxError::ToolNotFound(_)
        )
    }
}
