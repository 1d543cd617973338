//! Error types for MathAgent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using MathAgent's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for MathAgent
#[derive(Error, Debug)]
pub enum Error {
    /// Operation input could not be coerced to a number
    #[error("{0}")]
    InvalidArgument(String),

    /// Numeric input outside the operation's domain
    #[error("{0}")]
    Domain(String),

    /// Division with a zero denominator
    #[error("Cannot divide by zero")]
    DivisionByZero,

    /// No operation registered under this name
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A failure raised by an operation, tagged with the method that raised it
    #[error("{source}")]
    Operation {
        method: String,
        #[source]
        source: Box<Error>,
    },

    /// Agent identifier does not have the `agent-<timestamp>-<random>` shape
    #[error("Invalid agent ID")]
    InvalidAgentId(String),

    /// Well-formed agent identifier with no session behind it
    #[error("Agent not found")]
    AgentNotFound(String),

    /// Required top-level fields missing or of the wrong shape
    #[error("{0}")]
    MalformedRequest(String),

    /// Could not reach or initialise an agent session
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Failure reported by the gateway in an `error` frame
    #[error("{0}")]
    Remote(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket client error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, serialisable classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidArgument,
    DomainError,
    DivisionByZero,
    UnknownMethod,
    InvalidAgentId,
    AgentNotFound,
    MalformedRequest,
    TransportFailure,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::DomainError => "DomainError",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::UnknownMethod => "UnknownMethod",
            ErrorKind::InvalidAgentId => "InvalidAgentId",
            ErrorKind::AgentNotFound => "AgentNotFound",
            ErrorKind::MalformedRequest => "MalformedRequest",
            ErrorKind::TransportFailure => "TransportFailure",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Tag an operation failure with the method that produced it.
    ///
    /// Already-tagged errors are passed through unchanged.
    pub fn in_method(self, method: impl Into<String>) -> Self {
        match self {
            tagged @ Error::Operation { .. } => tagged,
            other => Error::Operation {
                method: method.into(),
                source: Box::new(other),
            },
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Domain(_) => ErrorKind::DomainError,
            Error::DivisionByZero => ErrorKind::DivisionByZero,
            Error::UnknownMethod(_) => ErrorKind::UnknownMethod,
            Error::Operation { source, .. } => source.kind(),
            Error::InvalidAgentId(_) => ErrorKind::InvalidAgentId,
            Error::AgentNotFound(_) => ErrorKind::AgentNotFound,
            Error::MalformedRequest(_) | Error::Json(_) => ErrorKind::MalformedRequest,
            Error::Transport(_) | Error::Http(_) | Error::WebSocket(_) | Error::Remote(_) => {
                ErrorKind::TransportFailure
            }
            Error::Config(_) | Error::Storage(_) | Error::Io(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// The method an operation failure was raised by, if any
    pub fn method(&self) -> Option<&str> {
        match self {
            Error::Operation { method, .. } => Some(method),
            _ => None,
        }
    }

    /// Check if error is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidArgument
                | ErrorKind::DomainError
                | ErrorKind::DivisionByZero
                | ErrorKind::UnknownMethod
                | ErrorKind::InvalidAgentId
                | ErrorKind::AgentNotFound
                | ErrorKind::MalformedRequest
        )
    }
}
