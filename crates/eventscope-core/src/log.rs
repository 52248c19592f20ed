//! Raw log records and log filters.

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// A raw, undecoded log record as emitted by a node.
/// This is the input to every classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Contract that emitted the log
    pub address: Address,
    /// topics[0] is the event signature hash; additional topics are indexed params
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed parameters
    pub data: Bytes,
    pub block_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    /// Channel the record arrived on (push listener name, subscription id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LogRecord {
    pub fn new(address: Address, topics: Vec<B256>, data: impl Into<Bytes>, block_number: u64) -> Self {
        Self {
            address,
            topics,
            data: data.into(),
            block_number,
            tx_hash: None,
            log_index: None,
            source: None,
        }
    }

    /// Tag the record with the channel it was delivered on.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns topics[0], the event signature hash, if present.
    pub fn signature(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// Filter applied by the node (or the in-process bus) before delivery.
///
/// `topics` follows JSON-RPC semantics: position `i` constrains topic `i`;
/// `None` matches anything, `Some(v)` matches any hash in `v`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_block: Option<u64>,
    /// `None` means the current head ("latest")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<Option<Vec<B256>>>,
}

impl LogFilter {
    /// A filter matching every log.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = Some(block);
        self
    }

    pub fn to_block(mut self, block: u64) -> Self {
        self.to_block = Some(block);
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.addresses.push(address);
        self
    }

    pub fn addresses(mut self, addresses: impl IntoIterator<Item = Address>) -> Self {
        self.addresses.extend(addresses);
        self
    }

    /// Restrict topic[0] to a single event signature.
    pub fn event(mut self, signature: B256) -> Self {
        if self.topics.is_empty() {
            self.topics.push(None);
        }
        self.topics[0] = Some(vec![signature]);
        self
    }

    /// Client-side evaluation, used by the in-process bus.
    /// Block bounds are inclusive.
    pub fn matches(&self, record: &LogRecord) -> bool {
        if self.from_block.is_some_and(|from| record.block_number < from) {
            return false;
        }
        if self.to_block.is_some_and(|to| record.block_number > to) {
            return false;
        }
        if !self.addresses.is_empty() && !self.addresses.contains(&record.address) {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            None => true,
            Some(options) => record
                .topics
                .get(i)
                .is_some_and(|topic| options.is_empty() || options.contains(topic)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(block: u64, topics: Vec<B256>) -> LogRecord {
        LogRecord::new(Address::repeat_byte(0x11), topics, vec![0u8; 32], block)
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(LogFilter::all().matches(&record(1, vec![])));
        assert!(LogFilter::all().matches(&record(9, vec![B256::repeat_byte(1)])));
    }

    #[test]
    fn event_filter_checks_first_topic() {
        let sig = B256::repeat_byte(0xdd);
        let filter = LogFilter::all().event(sig);
        assert!(filter.matches(&record(1, vec![sig, B256::ZERO])));
        assert!(!filter.matches(&record(1, vec![B256::repeat_byte(0xaa)])));
        assert!(!filter.matches(&record(1, vec![])));
    }

    #[test]
    fn block_and_address_bounds() {
        let filter = LogFilter::all()
            .from_block(10)
            .to_block(20)
            .address(Address::repeat_byte(0x11));
        assert!(filter.matches(&record(10, vec![])));
        assert!(filter.matches(&record(20, vec![])));
        assert!(!filter.matches(&record(21, vec![])));

        let mut other = record(15, vec![]);
        other.address = Address::repeat_byte(0x22);
        assert!(!filter.matches(&other));
    }

    #[test]
    fn record_serializes_as_hex() {
        let r = record(7, vec![B256::repeat_byte(0xab)]).with_source("ws");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["address"], "0x1111111111111111111111111111111111111111");
        assert_eq!(json["block_number"], 7);
        assert_eq!(json["source"], "ws");
        assert!(json.get("tx_hash").is_none());
    }
}
