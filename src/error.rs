//! Error types for invoke, stream and transport operations.

use std::fmt;

use crate::tag::Tag;

/// Error surfaced to the caller of an invoke or stream invoke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    /// Nothing in the context would receive the request.
    #[error("No invoke handler for event: {0}")]
    NoHandler(Tag),
    /// The handler ran and reported a failure.
    #[error("{message}")]
    Handler { message: String },
    /// Request could not be serialized.
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    /// Response could not be deserialized into the expected type.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// No reply arrived within the caller's deadline.
    #[error("invoke timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The invoker was dropped before the call settled.
    #[error("invoke channel closed before a reply arrived")]
    Closed,
    /// Batch registration got event and handler maps with different keys.
    #[error("event and handler keys differ (missing handlers: {missing_handlers:?}, missing events: {missing_events:?})")]
    MismatchedKeys {
        missing_handlers: Vec<String>,
        missing_events: Vec<String>,
    },
}

impl InvokeError {
    /// The message carried by a handler failure, if this is one.
    pub fn handler_message(&self) -> Option<&str> {
        match self {
            InvokeError::Handler { message } => Some(message),
            _ => None,
        }
    }
}

/// Error a handler hands back to the invoke layer.
///
/// Handlers may return any `Display` error; it is flattened into this type
/// before it crosses the event boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_display(err: impl fmt::Display) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<HandlerError> for InvokeError {
    fn from(err: HandlerError) -> Self {
        InvokeError::Handler {
            message: err.message,
        }
    }
}

/// Failure inside a transport adapter.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Wire data could not be parsed into an envelope.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The peer side of the transport is gone.
    #[error("transport disconnected: {0}")]
    Disconnected(String),
    /// Other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}
