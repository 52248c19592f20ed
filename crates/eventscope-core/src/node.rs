//! Interfaces of the node a transport reads logs from.
//!
//! Two shapes exist in practice: a remote node reached over JSON-RPC
//! ([`NodeClient`]) and an in-process event bus that calls back into the
//! embedder ([`LogBus`]).

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::{pin::Pin, sync::Arc};

use crate::{error::TransportError, log::LogFilter, log::LogRecord};

/// A stream of log records from a live subscription.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<LogRecord, TransportError>> + Send>>;

/// A live log subscription: the node-assigned id plus its record stream.
pub struct LogSubscription {
    pub id: String,
    pub stream: LogStream,
}

impl std::fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSubscription").field("id", &self.id).finish_non_exhaustive()
    }
}

/// A remote node's log API.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current head block number.
    async fn current_block_number(&self) -> Result<u64, TransportError>;

    /// All logs matching `filter`, in node order.
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, TransportError>;

    /// Open a live subscription to new logs matching `filter`.
    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, TransportError>;

    /// Cancel a subscription. Returns `false` if the node did not know it.
    async fn unsubscribe(&self, id: &str) -> Result<bool, TransportError>;
}

/// Callback invoked by a [`LogBus`] for every matching record.
pub type LogCallback = Arc<dyn Fn(LogRecord) + Send + Sync>;

/// Registration handle returned by [`LogBus::register_log_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerHandle(pub u64);

impl std::fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An in-process node event bus delivering logs through callbacks.
pub trait LogBus: Send + Sync {
    fn register_log_listener(
        &self,
        filter: LogFilter,
        callback: LogCallback,
    ) -> Result<ListenerHandle, TransportError>;

    /// Remove a listener. Unknown handles are reported as
    /// [`TransportError::UnknownListener`].
    fn unregister_log_listener(&self, handle: ListenerHandle) -> Result<(), TransportError>;
}
