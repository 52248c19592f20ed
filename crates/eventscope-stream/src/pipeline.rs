//! `EventPipeline`: classify, apply the unknown-event policy, hand to the sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use eventscope_core::{ClassificationResult, Classifier, LogRecord};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::UnknownEventPolicy;
use crate::sink::EventSink;

/// Counter snapshot for a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineMetrics {
    pub transfers: u64,
    pub malformed_transfers: u64,
    pub named_events: u64,
    pub unknown_emitted: u64,
    pub unknown_suppressed: u64,
    pub sink_errors: u64,
    pub metadata_timeouts: u64,
}

impl PipelineMetrics {
    /// Records classified, emitted or not.
    pub fn total(&self) -> u64 {
        self.transfers
            + self.malformed_transfers
            + self.named_events
            + self.unknown_emitted
            + self.unknown_suppressed
    }
}

#[derive(Default)]
struct Counters {
    transfers: AtomicU64,
    malformed_transfers: AtomicU64,
    named_events: AtomicU64,
    unknown_emitted: AtomicU64,
    unknown_suppressed: AtomicU64,
    sink_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The single path from a raw record to the sink, shared by every transport.
pub struct EventPipeline {
    classifier: Arc<Classifier>,
    sink: Arc<dyn EventSink>,
    unknown_events: UnknownEventPolicy,
    counters: Counters,
}

impl EventPipeline {
    pub fn new(classifier: Arc<Classifier>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            classifier,
            sink,
            unknown_events: UnknownEventPolicy::default(),
            counters: Counters::default(),
        }
    }

    pub fn with_unknown_events(mut self, policy: UnknownEventPolicy) -> Self {
        self.unknown_events = policy;
        self
    }

    /// Classify one record and emit the result.
    ///
    /// Never fails: sink errors are logged and counted. Returns the result
    /// whether or not it was emitted.
    pub async fn process(&self, record: LogRecord) -> ClassificationResult {
        let result = self.classifier.classify(record).await;
        debug!(
            kind = result.kind(),
            contract = %result.contract(),
            block = result.block_number(),
            "classified"
        );

        let c = &self.counters;
        match &result {
            ClassificationResult::Transfer(_) => Counters::bump(&c.transfers),
            ClassificationResult::TransferMalformed { .. } => Counters::bump(&c.malformed_transfers),
            ClassificationResult::NamedEvent { .. } => Counters::bump(&c.named_events),
            ClassificationResult::UnknownEvent { .. } => match self.unknown_events {
                UnknownEventPolicy::Emit => Counters::bump(&c.unknown_emitted),
                UnknownEventPolicy::Suppress => {
                    Counters::bump(&c.unknown_suppressed);
                    return result;
                }
            },
        }

        if let Err(e) = self.sink.emit(&result) {
            Counters::bump(&c.sink_errors);
            warn!(error = %e, kind = result.kind(), block = result.block_number(), "sink rejected result");
        }
        result
    }

    pub fn metrics(&self) -> PipelineMetrics {
        let c = &self.counters;
        PipelineMetrics {
            transfers: c.transfers.load(Ordering::Relaxed),
            malformed_transfers: c.malformed_transfers.load(Ordering::Relaxed),
            named_events: c.named_events.load(Ordering::Relaxed),
            unknown_emitted: c.unknown_emitted.load(Ordering::Relaxed),
            unknown_suppressed: c.unknown_suppressed.load(Ordering::Relaxed),
            sink_errors: c.sink_errors.load(Ordering::Relaxed),
            metadata_timeouts: self.classifier.metadata_timeouts(),
        }
    }
}

impl std::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPipeline")
            .field("classifier", &self.classifier)
            .field("unknown_events", &self.unknown_events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SinkError};
    use eventscope_core::{Address, Bytes, SignatureRegistry, B256};

    struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _result: &ClassificationResult) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    fn unknown_record(block: u64) -> LogRecord {
        LogRecord::new(Address::repeat_byte(1), vec![B256::repeat_byte(0x77)], Bytes::new(), block)
    }

    fn classifier() -> Arc<Classifier> {
        Arc::new(Classifier::new(Arc::new(SignatureRegistry::empty())))
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_later_records() {
        let pipeline = EventPipeline::new(classifier(), Arc::new(FailingSink));
        pipeline.process(unknown_record(1)).await;
        pipeline.process(unknown_record(2)).await;
        let m = pipeline.metrics();
        assert_eq!(m.sink_errors, 2);
        assert_eq!(m.unknown_emitted, 2);
        assert_eq!(m.total(), 2);
    }

    #[tokio::test]
    async fn suppressed_unknowns_are_counted_not_emitted() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = EventPipeline::new(classifier(), sink.clone())
            .with_unknown_events(UnknownEventPolicy::Suppress);
        let result = pipeline.process(unknown_record(5)).await;
        assert!(result.is_unknown());
        assert!(sink.is_empty());
        assert_eq!(pipeline.metrics().unknown_suppressed, 1);
    }
}
