use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the agent engine
#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum AgentError {
    /// No agent matched a task kind or description
    #[error("Routing error: {0}")]
    Routing(String),

    /// A code candidate was rejected by the safety validator
    #[error("Validation error: {0}")]
    Validation(String),

    /// Errors during agent logic or sandboxed code execution
    #[error("Execution error: {context}")]
    Execution {
        context: String,
        #[source]
        #[serde(skip)]
        source: Option<Box<AgentError>>,
    },

    /// Natural-language planning failures (inference or JSON parse)
    #[error("Planning error: {0}")]
    Planning(String),

    /// Sandbox runtime failures (script raised, limits exceeded)
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// JSON serialization/deserialization errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// I/O errors (file reading, etc.)
    #[error("IO error: {0}")]
    Io(String),

    /// HTTP request errors against the inference server
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Any other errors
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AgentError {
    /// Creates a new execution error with context
    pub fn execution<S: Into<String>>(context: S, source: Option<AgentError>) -> Self {
        AgentError::Execution {
            context: context.into(),
            source: source.map(Box::new),
        }
    }

    /// Creates a new HTTP error
    pub fn http<S: Into<String>>(status: u16, message: S) -> Self {
        AgentError::Http {
            status,
            message: message.into(),
        }
    }

    /// Convert from std::io::Error
    pub fn from_io(err: std::io::Error) -> Self {
        AgentError::Io(err.to_string())
    }

    /// Convert from serde_json::Error
    pub fn from_serde(err: serde_json::Error) -> Self {
        AgentError::Deserialization(err.to_string())
    }

    /// Short error code used in logs and result metadata
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::Routing(_) => "ROUTING_ERROR",
            AgentError::Validation(_) => "VALIDATION_ERROR",
            AgentError::Execution { .. } => "EXECUTION_ERROR",
            AgentError::Planning(_) => "PLANNING_ERROR",
            AgentError::Sandbox(_) => "SANDBOX_ERROR",
            AgentError::Deserialization(_) => "DESERIALIZATION_ERROR",
            AgentError::Io(_) => "IO_ERROR",
            AgentError::Http { .. } => "HTTP_ERROR",
            AgentError::Timeout(_) => "TIMEOUT_ERROR",
            AgentError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

/// Type alias for Result with AgentError
pub type Result<T> = std::result::Result<T, AgentError>;
