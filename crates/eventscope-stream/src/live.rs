//! Live transport: a `logs` subscription classified as records arrive.

use std::future::Future;
use std::sync::Arc;

use eventscope_core::{LogFilter, LogSubscription, NodeClient, TransportError};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::pipeline::EventPipeline;

/// What one subscription delivered before it ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSummary {
    pub subscription: String,
    pub records: u64,
}

/// Subscribes to new logs (no topic filter by default) and classifies each one.
pub struct LiveSubscriber {
    node: Arc<dyn NodeClient>,
    pipeline: Arc<EventPipeline>,
    filter: LogFilter,
}

impl LiveSubscriber {
    pub fn new(node: Arc<dyn NodeClient>, pipeline: Arc<EventPipeline>) -> Self {
        Self {
            node,
            pipeline,
            filter: LogFilter::all(),
        }
    }

    pub fn with_filter(mut self, filter: LogFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Open the subscription and run it on a background task.
    ///
    /// Subscription errors are returned here; later failures come back from
    /// [`LiveHandle::close`] or [`LiveHandle::join`].
    pub async fn spawn(self) -> Result<LiveHandle, TransportError> {
        let subscription = self.node.subscribe_logs(&self.filter).await.map_err(|e| {
            error!(error = %e, "log subscription failed");
            e
        })?;
        let id = subscription.id.clone();
        info!(subscription = %id, "live subscription started");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.consume(subscription, shutdown_rx));
        Ok(LiveHandle {
            subscription: id,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    async fn consume(
        self,
        subscription: LogSubscription,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Result<LiveSummary, TransportError> {
        let LogSubscription { id, mut stream } = subscription;
        let mut summary = LiveSummary {
            subscription: id.clone(),
            records: 0,
        };

        loop {
            let record = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                item = stream.next() => match item {
                    Some(Ok(record)) => record,
                    Some(Err(e)) => {
                        error!(subscription = %id, error = %e, "live subscription failed");
                        return Err(e);
                    }
                    None => {
                        error!(subscription = %id, records = summary.records, "subscription ended by the node");
                        return Err(TransportError::Closed);
                    }
                },
            };

            // closing abandons the record in flight, including its metadata lookups
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                result = self.pipeline.process(record) => {
                    summary.records += 1;
                    debug!(subscription = %id, kind = result.kind(), "live record");
                }
            }
        }

        drop(stream);
        match self.node.unsubscribe(&id).await {
            Ok(true) => {}
            Ok(false) => warn!(subscription = %id, "node did not know the subscription"),
            Err(e) => warn!(subscription = %id, error = %e, "unsubscribe failed"),
        }
        info!(
            subscription = %id,
            records = summary.records,
            metrics = ?self.pipeline.metrics(),
            "live subscription closed"
        );
        Ok(summary)
    }
}

/// Control handle for a running [`LiveSubscriber`]. Dropping it closes the
/// subscription.
pub struct LiveHandle {
    subscription: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<LiveSummary, TransportError>>,
}

impl LiveHandle {
    /// Node-assigned subscription id.
    pub fn subscription_id(&self) -> &str {
        &self.subscription
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the node ends the subscription.
    pub async fn join(mut self) -> Result<LiveSummary, TransportError> {
        let joined = (&mut self.task).await;
        joined.map_err(task_failed)?
    }

    /// Run until `signal` resolves, then close. Returns early if the node ends
    /// the subscription first.
    pub async fn close_on<F: Future>(mut self, signal: F) -> Result<LiveSummary, TransportError> {
        let joined = tokio::select! {
            _ = signal => None,
            joined = &mut self.task => Some(joined),
        };
        match joined {
            Some(joined) => joined.map_err(task_failed)?,
            None => self.close().await,
        }
    }

    /// Stop delivery, unsubscribe, and wait for the task.
    ///
    /// `Ok` when the close was ours; the transport error if the node had
    /// already ended the stream.
    pub async fn close(mut self) -> Result<LiveSummary, TransportError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let joined = (&mut self.task).await;
        joined.map_err(task_failed)?
    }
}

fn task_failed(e: tokio::task::JoinError) -> TransportError {
    TransportError::Other(format!("live subscriber task failed: {e}"))
}
