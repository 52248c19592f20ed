//! Conversion between JSON-RPC log objects and [`LogRecord`] / [`LogFilter`].

use alloy_primitives::{Address, Bytes, B256};
use eventscope_core::{LogFilter, LogRecord};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::RpcError;

/// A log object as returned by `eth_getLogs` and `logs` subscriptions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
    /// `null` for pending logs.
    pub block_number: Option<String>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<String>,
    /// Set on logs retracted by a reorg.
    #[serde(default)]
    pub removed: bool,
}

impl RpcLog {
    pub fn into_record(self) -> Result<LogRecord, RpcError> {
        let block_number = self
            .block_number
            .as_deref()
            .map(parse_quantity)
            .transpose()?
            .ok_or_else(|| RpcError::UnexpectedResponse("log without blockNumber".into()))?;
        let log_index = self.log_index.as_deref().map(parse_quantity).transpose()?;
        let mut record = LogRecord::new(self.address, self.topics, self.data, block_number);
        record.tx_hash = self.transaction_hash;
        record.log_index = log_index;
        Ok(record)
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> Result<u64, RpcError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| RpcError::UnexpectedResponse(format!("quantity without 0x prefix: {s}")))?;
    if digits.is_empty() {
        return Err(RpcError::UnexpectedResponse("empty quantity".into()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::UnexpectedResponse(format!("invalid quantity {s}: {e}")))
}

pub fn quantity(n: u64) -> String {
    format!("0x{n:x}")
}

/// Decode one log object. Removed and pending (no block yet) logs yield `None`.
pub fn log_from_json(value: Value) -> Result<Option<LogRecord>, RpcError> {
    let log: RpcLog = serde_json::from_value(value)?;
    if log.removed {
        tracing::debug!(address = %log.address, "skipping removed log");
        return Ok(None);
    }
    if log.block_number.is_none() {
        tracing::debug!(address = %log.address, "skipping pending log");
        return Ok(None);
    }
    log.into_record().map(Some)
}

/// Decode an `eth_getLogs` result array.
pub fn logs_from_json(value: Value) -> Result<Vec<LogRecord>, RpcError> {
    let Value::Array(items) = value else {
        return Err(RpcError::UnexpectedResponse(format!(
            "eth_getLogs returned non-array: {value}"
        )));
    };
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        if let Some(record) = log_from_json(item)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// Build the filter object for `eth_getLogs`.
///
/// A missing `to_block` becomes `"latest"`. Empty address and topic lists
/// are omitted so the node applies no constraint.
pub fn filter_to_json(filter: &LogFilter) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert(
        "fromBlock".into(),
        json!(filter.from_block.map(quantity).unwrap_or_else(|| "earliest".into())),
    );
    obj.insert(
        "toBlock".into(),
        json!(filter.to_block.map(quantity).unwrap_or_else(|| "latest".into())),
    );
    insert_constraints(&mut obj, filter);
    Value::Object(obj)
}

/// Filter object for `eth_subscribe("logs", ..)`. Subscriptions take no block range.
pub fn subscription_filter_to_json(filter: &LogFilter) -> Value {
    let mut obj = serde_json::Map::new();
    insert_constraints(&mut obj, filter);
    Value::Object(obj)
}

fn insert_constraints(obj: &mut serde_json::Map<String, Value>, filter: &LogFilter) {
    match filter.addresses.as_slice() {
        [] => {}
        [single] => {
            obj.insert("address".into(), json!(single));
        }
        many => {
            obj.insert("address".into(), json!(many));
        }
    }
    if !filter.topics.is_empty() {
        let topics: Vec<Value> = filter
            .topics
            .iter()
            .map(|slot| match slot {
                None => Value::Null,
                Some(options) if options.len() == 1 => json!(options[0]),
                Some(options) => json!(options),
            })
            .collect();
        obj.insert("topics".into(), Value::Array(topics));
    }
}
