//! One-shot scan of recent blocks via `eth_getLogs`.

use std::fmt;
use std::sync::Arc;

use eventscope_core::{Address, ClassificationResult, LogFilter, NodeClient, TransportError};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::PollConfig;
use crate::pipeline::EventPipeline;

/// What one poll saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub from_block: u64,
    pub to_block: u64,
    /// `eth_getLogs` calls issued
    pub requests: u64,
    pub records: u64,
    pub transfers: u64,
    pub malformed_transfers: u64,
    pub named_events: u64,
    pub unknown_events: u64,
}

impl PollSummary {
    fn count(&mut self, result: &ClassificationResult) {
        self.records += 1;
        match result {
            ClassificationResult::Transfer(_) => self.transfers += 1,
            ClassificationResult::TransferMalformed { .. } => self.malformed_transfers += 1,
            ClassificationResult::NamedEvent { .. } => self.named_events += 1,
            ClassificationResult::UnknownEvent { .. } => self.unknown_events += 1,
        }
    }
}

impl fmt::Display for PollSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blocks {}..={}: {} records ({} transfers, {} malformed, {} named, {} unknown)",
            self.from_block,
            self.to_block,
            self.records,
            self.transfers,
            self.malformed_transfers,
            self.named_events,
            self.unknown_events
        )
    }
}

/// Reads the head block, fetches logs for `[head - window, head]` and
/// classifies them in the order the node returned them.
pub struct HistoricalPoller {
    node: Arc<dyn NodeClient>,
    pipeline: Arc<EventPipeline>,
    window: u64,
    max_block_range: u64,
    addresses: Vec<Address>,
}

impl HistoricalPoller {
    pub fn new(node: Arc<dyn NodeClient>, pipeline: Arc<EventPipeline>) -> Self {
        let defaults = PollConfig::default();
        Self {
            node,
            pipeline,
            window: defaults.window,
            max_block_range: defaults.max_block_range,
            addresses: defaults.addresses,
        }
    }

    pub fn from_config(
        node: Arc<dyn NodeClient>,
        pipeline: Arc<EventPipeline>,
        config: &PollConfig,
    ) -> Self {
        Self::new(node, pipeline)
            .with_window(config.window)
            .with_max_block_range(config.max_block_range)
            .with_addresses(config.addresses.clone())
    }

    pub fn with_window(mut self, window: u64) -> Self {
        self.window = window;
        self
    }

    /// Blocks per `eth_getLogs` call; 0 fetches the window in one call.
    pub fn with_max_block_range(mut self, blocks: u64) -> Self {
        self.max_block_range = blocks;
        self
    }

    pub fn with_addresses(mut self, addresses: Vec<Address>) -> Self {
        self.addresses = addresses;
        self
    }

    /// Inclusive range scanned for a given head.
    pub fn block_range(&self, head: u64) -> (u64, u64) {
        (head.saturating_sub(self.window), head)
    }

    /// Split `[from, to]` into consecutive inclusive chunks.
    fn chunks(&self, from: u64, to: u64) -> Vec<(u64, u64)> {
        if self.max_block_range == 0 {
            return vec![(from, to)];
        }
        let mut chunks = Vec::new();
        let mut start = from;
        while start <= to {
            let end = start.saturating_add(self.max_block_range - 1).min(to);
            chunks.push((start, end));
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        chunks
    }

    /// Run one poll to completion.
    pub async fn run(&self) -> Result<PollSummary, TransportError> {
        let head = self.node.current_block_number().await.map_err(|e| {
            error!(error = %e, "cannot read head block");
            e
        })?;
        let (from, to) = self.block_range(head);
        info!(from, to, window = self.window, "polling historical logs");

        let mut summary = PollSummary {
            from_block: from,
            to_block: to,
            ..PollSummary::default()
        };
        for (start, end) in self.chunks(from, to) {
            let filter = LogFilter::all()
                .from_block(start)
                .to_block(end)
                .addresses(self.addresses.iter().copied());
            let records = self.node.get_logs(&filter).await.map_err(|e| {
                error!(from = start, to = end, error = %e, "eth_getLogs failed");
                e
            })?;
            summary.requests += 1;
            debug!(from = start, to = end, records = records.len(), "fetched log chunk");

            for record in records {
                let result = self.pipeline.process(record).await;
                summary.count(&result);
            }
        }

        info!(%summary, "historical poll complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use eventscope_core::{Classifier, LogRecord, LogSubscription, SignatureRegistry};

    struct NoNode;

    #[async_trait::async_trait]
    impl NodeClient for NoNode {
        async fn current_block_number(&self) -> Result<u64, TransportError> {
            Ok(0)
        }
        async fn get_logs(&self, _filter: &LogFilter) -> Result<Vec<LogRecord>, TransportError> {
            Ok(vec![])
        }
        async fn subscribe_logs(&self, _filter: &LogFilter) -> Result<LogSubscription, TransportError> {
            Err(TransportError::Other("unsupported".into()))
        }
        async fn unsubscribe(&self, _id: &str) -> Result<bool, TransportError> {
            Ok(false)
        }
    }

    fn poller(window: u64, max_block_range: u64) -> HistoricalPoller {
        let classifier = Arc::new(Classifier::new(Arc::new(SignatureRegistry::empty())));
        let pipeline = Arc::new(EventPipeline::new(classifier, Arc::new(MemorySink::new())));
        HistoricalPoller::new(Arc::new(NoNode), pipeline)
            .with_window(window)
            .with_max_block_range(max_block_range)
    }

    #[test]
    fn window_is_inclusive_and_saturates() {
        assert_eq!(poller(10, 0).block_range(100), (90, 100));
        assert_eq!(poller(10, 0).block_range(3), (0, 3));
    }

    #[test]
    fn chunking_covers_range_in_order() {
        assert_eq!(poller(10, 0).chunks(90, 100), vec![(90, 100)]);
        assert_eq!(
            poller(10, 4).chunks(90, 100),
            vec![(90, 93), (94, 97), (98, 100)]
        );
        assert_eq!(poller(10, 1).chunks(5, 6), vec![(5, 5), (6, 6)]);
    }

    #[tokio::test]
    async fn genesis_head_polls_block_zero() {
        let summary = poller(10, 0).run().await.unwrap();
        assert_eq!((summary.from_block, summary.to_block), (0, 0));
        assert_eq!(summary.requests, 1);
        assert_eq!(summary.records, 0);
    }
}
