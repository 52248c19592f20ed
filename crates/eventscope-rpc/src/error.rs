//! RPC-level error types.

use eventscope_core::TransportError;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to a node.
#[derive(Debug, Error)]
pub enum RpcError {
    /// HTTP request failed (connection refused, non-2xx status, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connect/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The node answered, but not with what the method promises.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl RpcError {
    /// Transient errors worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. })
    }
}

impl From<RpcError> for TransportError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Timeout { ms } => TransportError::Timeout { ms },
            RpcError::Rpc(err) => TransportError::Rpc(err.to_string()),
            other => TransportError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(RpcError::Http("503".into()).is_retryable());
        assert!(RpcError::Timeout { ms: 10 }.is_retryable());
        assert!(!RpcError::Rpc(JsonRpcError {
            code: -32602,
            message: "invalid params".into(),
            data: None,
        })
        .is_retryable());
    }

    #[test]
    fn converts_into_transport_error() {
        let t: TransportError = RpcError::Timeout { ms: 250 }.into();
        assert!(matches!(t, TransportError::Timeout { ms: 250 }));
        let t: TransportError = RpcError::WebSocket("reset".into()).into();
        assert_eq!(t.to_string(), "WebSocket error: reset");
    }
}
