//! In-process log bus for embedders that run inside the node process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use eventscope_core::{ListenerHandle, LogBus, LogCallback, LogFilter, LogRecord, TransportError};
use tracing::{debug, warn};

/// A [`LogBus`] the host feeds with [`publish`](Self::publish).
///
/// Callbacks run on the publishing thread, outside the registration lock, in
/// registration order.
#[derive(Default)]
pub struct InProcessLogBus {
    next_handle: AtomicU64,
    listeners: RwLock<BTreeMap<u64, (LogFilter, LogCallback)>>,
}

impl InProcessLogBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `record` to every listener whose filter matches it.
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, record: &LogRecord) -> usize {
        let targets: Vec<LogCallback> = {
            let listeners = self.listeners.read().unwrap_or_else(|p| p.into_inner());
            listeners
                .values()
                .filter(|(filter, _)| filter.matches(record))
                .map(|(_, cb)| cb.clone())
                .collect()
        };
        for cb in &targets {
            cb(record.clone());
        }
        targets.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl LogBus for InProcessLogBus {
    fn register_log_listener(
        &self,
        filter: LogFilter,
        callback: LogCallback,
    ) -> Result<ListenerHandle, TransportError> {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        self.listeners
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id, (filter, callback));
        debug!(handle = id, "log listener registered");
        Ok(ListenerHandle(id))
    }

    fn unregister_log_listener(&self, handle: ListenerHandle) -> Result<(), TransportError> {
        let removed = self
            .listeners
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&handle.0);
        match removed {
            Some(_) => {
                debug!(%handle, "log listener removed");
                Ok(())
            }
            None => {
                warn!(%handle, "unregister for unknown log listener");
                Err(TransportError::UnknownListener(handle.0))
            }
        }
    }
}
