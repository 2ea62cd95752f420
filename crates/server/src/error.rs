//! Errors raised by the host before a request reaches the worker.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Malformed tool arguments (URL, method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A control message the worker does not understand.
    #[error("INVALID_INPUT: unknown control message: {0}")]
    UnknownMessage(String),
}

impl From<HostError> for McpError {
    fn from(err: HostError) -> Self {
        let message = err.to_string();
        let code = match &err {
            HostError::InvalidInput(_) | HostError::UnknownMessage(_) => -32602,
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
