//! Error types for the eventscope pipeline.

use thiserror::Error;

/// Errors produced while decoding a single Transfer-shaped log.
///
/// These never escape the classification pipeline; they are surfaced as
/// [`ClassificationResult::TransferMalformed`](crate::ClassificationResult::TransferMalformed).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Transfer log has {found} topics, expected at least 3")]
    MalformedTopics { found: usize },

    #[error("Transfer amount unreadable: {reason}")]
    MalformedData { reason: String },

    #[error("log is not a Transfer event")]
    NotTransfer,
}

/// Errors from loading the signature registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("signature source {path} unreadable: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while reading signatures: {0}")]
    Io(#[from] std::io::Error),

    #[error("signature registry is empty and empty registries are not allowed")]
    Empty,
}

/// Errors from a node connection or log bus.
///
/// Terminal for the delivery loop that hit them, never for the process.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("subscription closed by the node")]
    Closed,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("unknown log listener {0}")]
    UnknownListener(u64),

    #[error("listener is already running")]
    AlreadyRunning,

    #[error("listener is not running")]
    NotRunning,

    #[error("{0}")]
    Other(String),
}

/// Errors from a token metadata lookup.
///
/// All of them degrade to "unknown" in the classifier.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("token metadata lookup timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("token call failed: {0}")]
    Call(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}
