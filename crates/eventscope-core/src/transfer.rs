//! ERC-20 `Transfer(address indexed from, address indexed to, uint256 value)` decoding.
//!
//! # Layout
//! - topics[0] → `keccak256("Transfer(address,address,uint256)")`
//! - topics[1] → `from`, left-padded to 32 bytes
//! - topics[2] → `to`, left-padded to 32 bytes
//! - `data`    → `value`, big-endian uint256

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{error::DecodeError, log::LogRecord, signature::transfer_signature};

/// A decoded token transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedTransfer {
    /// Token contract that emitted the log
    pub token: Address,
    pub from: Address,
    pub to: Address,
    /// Amount in the token's smallest unit
    pub raw_amount: U256,
    /// `raw_amount / 10^decimals`, only when decimals are known
    pub scaled_amount: Option<U256>,
    pub decimals: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_symbol: Option<String>,
    pub block_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl DecodedTransfer {
    /// Apply a decimals value, recomputing `scaled_amount`.
    pub fn with_decimals(mut self, decimals: Option<u8>) -> Self {
        self.decimals = decimals;
        self.scaled_amount = decimals.map(|d| scale_amount(self.raw_amount, d));
        self
    }

    /// The scaled amount when decimals are known, the raw amount otherwise.
    pub fn display_amount(&self) -> U256 {
        self.scaled_amount.unwrap_or(self.raw_amount)
    }
}

/// Returns `true` if topic[0] is the Transfer signature.
///
/// Does not check the topic count; [`decode`] does.
pub fn is_transfer(record: &LogRecord) -> bool {
    record.signature() == Some(transfer_signature())
}

/// Decode a Transfer log, optionally scaling the amount by `decimals`.
pub fn decode(record: &LogRecord, decimals: Option<u8>) -> Result<DecodedTransfer, DecodeError> {
    if !is_transfer(record) {
        return Err(DecodeError::NotTransfer);
    }
    if record.topics.len() < 3 {
        return Err(DecodeError::MalformedTopics {
            found: record.topics.len(),
        });
    }

    let raw_amount = amount_from_data(&record.data)?;

    let transfer = DecodedTransfer {
        token: record.address,
        from: Address::from_word(record.topics[1]),
        to: Address::from_word(record.topics[2]),
        raw_amount,
        scaled_amount: None,
        decimals: None,
        token_name: None,
        token_symbol: None,
        block_number: record.block_number,
        tx_hash: record.tx_hash,
        log_index: record.log_index,
    };
    Ok(transfer.with_decimals(decimals))
}

/// Interpret the data payload as a big-endian unsigned integer.
fn amount_from_data(data: &[u8]) -> Result<U256, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::MalformedData {
            reason: "empty data payload".into(),
        });
    }
    let significant = match data.iter().position(|b| *b != 0) {
        Some(first) => &data[first..],
        None => return Ok(U256::ZERO),
    };
    U256::try_from_be_slice(significant).ok_or_else(|| DecodeError::MalformedData {
        reason: format!("{}-byte payload exceeds 256 bits", data.len()),
    })
}

/// Floor division by `10^decimals`. Scales too large for 256 bits yield zero.
pub fn scale_amount(raw: U256, decimals: u8) -> U256 {
    match U256::from(10u8).checked_pow(U256::from(decimals)) {
        Some(divisor) => raw / divisor,
        None => U256::ZERO,
    }
}
