//! The classification pipeline every transport routes log records through.
//!
//! ```text
//! LogRecord
//!     │
//!     ├─ topic[0] == Transfer ──► decode ──┬─ ok  ─► metadata (bounded) ─► Transfer
//!     │                                    └─ err ─────────────────────► TransferMalformed
//!     │
//!     └─ otherwise ──► registry lookup ──┬─ hit  ─► NamedEvent
//!                                        └─ miss ─► UnknownEvent
//! ```

use alloy_primitives::{Address, B256};
use serde::{Serialize, Serializer};
use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, warn};

use crate::{
    error::{DecodeError, MetadataError},
    log::LogRecord,
    metadata::{NoMetadata, TokenMetadataProvider},
    registry::{unknown_event_label, SignatureRegistry},
    transfer::{self, DecodedTransfer},
};

/// Outcome of classifying one log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationResult {
    /// A well-formed ERC-20 Transfer
    Transfer(DecodedTransfer),
    /// Transfer signature, but the topics or data could not be decoded
    TransferMalformed {
        #[serde(serialize_with = "serialize_display")]
        error: DecodeError,
        record: LogRecord,
    },
    /// Any other event whose signature the registry knows
    NamedEvent { name: String, record: LogRecord },
    /// Signature not in the registry (zero hash for anonymous logs)
    UnknownEvent { signature: B256, record: LogRecord },
}

impl ClassificationResult {
    /// Short variant name, used for counters and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "transfer",
            Self::TransferMalformed { .. } => "transfer_malformed",
            Self::NamedEvent { .. } => "named_event",
            Self::UnknownEvent { .. } => "unknown_event",
        }
    }

    /// Contract that emitted the underlying log.
    pub fn contract(&self) -> Address {
        match self {
            Self::Transfer(t) => t.token,
            Self::TransferMalformed { record, .. }
            | Self::NamedEvent { record, .. }
            | Self::UnknownEvent { record, .. } => record.address,
        }
    }

    pub fn block_number(&self) -> u64 {
        match self {
            Self::Transfer(t) => t.block_number,
            Self::TransferMalformed { record, .. }
            | Self::NamedEvent { record, .. }
            | Self::UnknownEvent { record, .. } => record.block_number,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::UnknownEvent { .. })
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transfer(t) => {
                write!(f, "{:#x} Transfer", t.token)?;
                if let Some(name) = &t.token_name {
                    write!(f, " {name}")?;
                }
                if let Some(symbol) = &t.token_symbol {
                    write!(f, " ({symbol})")?;
                }
                write!(
                    f,
                    " from {:#x} to {:#x} value {} at block {}",
                    t.from,
                    t.to,
                    t.display_amount(),
                    t.block_number
                )
            }
            Self::TransferMalformed { error, record } => write!(
                f,
                "{:#x} Transfer (malformed: {error}) at block {}",
                record.address, record.block_number
            ),
            Self::NamedEvent { name, record } => {
                write!(f, "{:#x} {name} at block {}", record.address, record.block_number)
            }
            Self::UnknownEvent { signature, record } => write!(
                f,
                "{:#x} {} at block {}",
                record.address,
                unknown_event_label(signature),
                record.block_number
            ),
        }
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Route a record with an already-known decimals value.
///
/// Pure: no I/O, no metadata lookups.
pub fn classify_with_decimals(
    record: LogRecord,
    registry: &SignatureRegistry,
    decimals: Option<u8>,
) -> ClassificationResult {
    if !transfer::is_transfer(&record) {
        return route_event(record, registry);
    }
    match transfer::decode(&record, decimals) {
        Ok(t) => ClassificationResult::Transfer(t),
        Err(error) => ClassificationResult::TransferMalformed { error, record },
    }
}

fn route_event(record: LogRecord, registry: &SignatureRegistry) -> ClassificationResult {
    let signature = record.signature().unwrap_or(B256::ZERO);
    match registry.lookup(&signature) {
        Some(name) if !record.topics.is_empty() => ClassificationResult::NamedEvent {
            name: name.to_string(),
            record,
        },
        _ => ClassificationResult::UnknownEvent { signature, record },
    }
}

/// Default bound on a single token metadata call.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Classifies records against a shared registry, enriching transfers with
/// token metadata under a timeout.
///
/// Cheap to share: wrap in an `Arc` and hand it to every transport.
pub struct Classifier {
    registry: Arc<SignatureRegistry>,
    metadata: Arc<dyn TokenMetadataProvider>,
    lookup_timeout: Duration,
    metadata_timeouts: AtomicU64,
}

impl Classifier {
    /// A classifier without token metadata.
    pub fn new(registry: Arc<SignatureRegistry>) -> Self {
        Self {
            registry,
            metadata: Arc::new(NoMetadata),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            metadata_timeouts: AtomicU64::new(0),
        }
    }

    pub fn with_metadata(mut self, metadata: Arc<dyn TokenMetadataProvider>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Number of metadata calls that hit the timeout so far.
    pub fn metadata_timeouts(&self) -> u64 {
        self.metadata_timeouts.load(Ordering::Relaxed)
    }

    /// Classify one record.
    ///
    /// Metadata is only requested for decodable transfers; a failed or slow
    /// lookup leaves the corresponding field `None`.
    pub async fn classify(&self, record: LogRecord) -> ClassificationResult {
        if !transfer::is_transfer(&record) {
            return route_event(record, &self.registry);
        }
        let decoded = match transfer::decode(&record, None) {
            Ok(t) => t,
            Err(error) => {
                debug!(contract = %record.address, block = record.block_number, %error, "malformed transfer");
                return ClassificationResult::TransferMalformed { error, record };
            }
        };

        let token = decoded.token;
        let (decimals, name, symbol) = tokio::join!(
            self.bounded("decimals", token, self.metadata.decimals(token)),
            self.bounded("name", token, self.metadata.name(token)),
            self.bounded("symbol", token, self.metadata.symbol(token)),
        );

        let mut transfer = decoded.with_decimals(decimals);
        transfer.token_name = name;
        transfer.token_symbol = symbol;
        ClassificationResult::Transfer(transfer)
    }

    async fn bounded<T, F>(&self, lookup: &'static str, token: Address, call: F) -> Option<T>
    where
        F: Future<Output = Result<Option<T>, MetadataError>>,
    {
        match tokio::time::timeout(self.lookup_timeout, call).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                debug!(%token, lookup, error = %e, "token metadata unavailable");
                None
            }
            Err(_) => {
                self.metadata_timeouts.fetch_add(1, Ordering::Relaxed);
                let e = MetadataError::Timeout {
                    ms: self.lookup_timeout.as_millis() as u64,
                };
                warn!(%token, lookup, error = %e, "token metadata lookup abandoned");
                None
            }
        }
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("signatures", &self.registry.len())
            .field("lookup_timeout", &self.lookup_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{event_signature_hash, transfer_signature};
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingMetadata {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenMetadataProvider for CountingMetadata {
        async fn decimals(&self, _token: Address) -> Result<Option<u8>, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(6))
        }

        async fn name(&self, _token: Address) -> Result<Option<String>, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(MetadataError::Call("execution reverted".into()))
        }

        async fn symbol(&self, _token: Address) -> Result<Option<String>, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some("USDC".into()))
        }
    }

    fn record(topics: Vec<B256>) -> LogRecord {
        LogRecord::new(
            Address::repeat_byte(0xcc),
            topics,
            U256::from(2_500_000u64).to_be_bytes::<32>().to_vec(),
            42,
        )
    }

    fn transfer_topics() -> Vec<B256> {
        vec![
            transfer_signature(),
            Address::repeat_byte(0xaa).into_word(),
            Address::repeat_byte(0xbb).into_word(),
        ]
    }

    #[tokio::test]
    async fn metadata_enriches_transfer() {
        let metadata = Arc::new(CountingMetadata::default());
        let classifier = Classifier::new(Arc::new(SignatureRegistry::empty()))
            .with_metadata(metadata.clone());

        let result = classifier.classify(record(transfer_topics())).await;
        let ClassificationResult::Transfer(t) = &result else {
            panic!("expected transfer, got {result:?}");
        };
        assert_eq!(t.decimals, Some(6));
        assert_eq!(t.scaled_amount, Some(U256::from(2u8)));
        assert_eq!(t.token_name, None);
        assert_eq!(t.token_symbol.as_deref(), Some("USDC"));
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            result.to_string(),
            "0xcccccccccccccccccccccccccccccccccccccccc Transfer (USDC) \
             from 0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa \
             to 0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb value 2 at block 42"
        );
    }

    #[tokio::test]
    async fn no_metadata_calls_for_other_events() {
        let metadata = Arc::new(CountingMetadata::default());
        let registry = SignatureRegistry::from_declarations(["Sync(uint112,uint112)"]);
        let classifier = Classifier::new(Arc::new(registry)).with_metadata(metadata.clone());

        let named = classifier
            .classify(record(vec![event_signature_hash("Sync(uint112,uint112)")]))
            .await;
        assert_eq!(named.kind(), "named_event");

        let malformed = classifier.classify(record(vec![transfer_signature()])).await;
        assert_eq!(malformed.kind(), "transfer_malformed");

        assert_eq!(metadata.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn anonymous_log_is_unknown() {
        let registry = SignatureRegistry::bundled();
        let result = classify_with_decimals(record(vec![]), &registry, None);
        assert_eq!(
            result,
            ClassificationResult::UnknownEvent {
                signature: B256::ZERO,
                record: record(vec![]),
            }
        );
    }

    #[test]
    fn display_named_and_unknown() {
        let registry = SignatureRegistry::from_declarations(["Paused(address)"]);
        let named = classify_with_decimals(
            record(vec![event_signature_hash("Paused(address)")]),
            &registry,
            None,
        );
        assert_eq!(
            named.to_string(),
            "0xcccccccccccccccccccccccccccccccccccccccc Paused(address) at block 42"
        );

        let unknown = classify_with_decimals(record(vec![B256::repeat_byte(0x01)]), &registry, None);
        assert!(unknown
            .to_string()
            .ends_with("Unknown Event 0x0101010101010101010101010101010101010101010101010101010101010101 at block 42"));
    }

    #[test]
    fn malformed_serializes_error_text() {
        let result = classify_with_decimals(record(vec![transfer_signature()]), &SignatureRegistry::empty(), None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["kind"], "transfer_malformed");
        assert_eq!(json["error"], "Transfer log has 1 topics, expected at least 3");
        assert_eq!(json["record"]["block_number"], 42);
    }
}
