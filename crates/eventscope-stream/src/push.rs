//! Push transport: records delivered by callback from an in-process [`LogBus`].

use std::sync::{Arc, Mutex};

use eventscope_core::{
    transfer_signature, ListenerHandle, LogBus, LogCallback, LogFilter, LogRecord, TransportError,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::EventPipeline;

struct Running {
    handle: ListenerHandle,
    stop: oneshot::Sender<()>,
    worker: JoinHandle<u64>,
}

/// Registers a callback on a [`LogBus`] and classifies what it delivers.
///
/// The callback only enqueues; a single worker task drains the queue through
/// the pipeline, so the bus thread never waits on metadata lookups and one
/// record at a time is in flight.
pub struct PushListener {
    bus: Arc<dyn LogBus>,
    pipeline: Arc<EventPipeline>,
    filter: LogFilter,
    name: String,
    running: Mutex<Option<Running>>,
}

impl PushListener {
    /// Listener for ERC-20 Transfer logs from any contract.
    pub fn new(bus: Arc<dyn LogBus>, pipeline: Arc<EventPipeline>) -> Self {
        Self {
            bus,
            pipeline,
            filter: LogFilter::all().event(transfer_signature()),
            name: "push".into(),
            running: Mutex::new(None),
        }
    }

    pub fn with_filter(mut self, filter: LogFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Source tag stamped on every delivered record.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    /// Register with the bus and start the worker. Needs a Tokio runtime.
    pub fn start(&self) -> Result<ListenerHandle, TransportError> {
        let mut running = self.lock_running();
        if running.is_some() {
            return Err(TransportError::AlreadyRunning);
        }

        let (tx, rx) = mpsc::unbounded_channel::<LogRecord>();
        let name = self.name.clone();
        let callback: LogCallback = Arc::new(move |record: LogRecord| {
            // worker gone means we are stopping; drop late deliveries
            let _ = tx.send(record.with_source(name.as_str()));
        });
        let handle = self.bus.register_log_listener(self.filter.clone(), callback)?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let worker = tokio::spawn(drain(rx, stop_rx, Arc::clone(&self.pipeline)));
        info!(listener = %self.name, %handle, "push listener started");

        *running = Some(Running {
            handle,
            stop: stop_tx,
            worker,
        });
        Ok(handle)
    }

    /// Unregister from the bus, then wait for already-queued records to be
    /// processed. Returns how many records this run processed.
    ///
    /// Stopping a listener that is not running is an error, never a panic.
    pub async fn stop(&self) -> Result<u64, TransportError> {
        let Running {
            handle,
            stop,
            worker,
        } = self.lock_running().take().ok_or(TransportError::NotRunning)?;

        let unregistered = self.bus.unregister_log_listener(handle);
        let _ = stop.send(());
        let processed = worker
            .await
            .map_err(|e| TransportError::Other(format!("push worker failed: {e}")))?;

        info!(
            listener = %self.name,
            %handle,
            processed,
            metrics = ?self.pipeline.metrics(),
            "push listener stopped"
        );
        unregistered.map(|()| processed)
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Drop for PushListener {
    fn drop(&mut self) {
        if let Some(running) = self.lock_running().take() {
            if let Err(e) = self.bus.unregister_log_listener(running.handle) {
                warn!(listener = %self.name, error = %e, "unregister on drop failed");
            }
            let _ = running.stop.send(());
        }
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<LogRecord>,
    mut stop: oneshot::Receiver<()>,
    pipeline: Arc<EventPipeline>,
) -> u64 {
    let mut processed = 0u64;
    let mut closing = false;
    loop {
        tokio::select! {
            biased;
            Some(record) = rx.recv() => {
                pipeline.process(record).await;
                processed += 1;
            }
            _ = &mut stop, if !closing => {
                // no new sends; what is buffered is still drained
                rx.close();
                closing = true;
            }
            else => break,
        }
    }
    processed
}
