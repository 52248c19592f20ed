//! Token metadata lookups used to enrich decoded transfers.

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::error::MetadataError;

/// Source of ERC-20 `decimals()`, `name()` and `symbol()` values.
///
/// Every method may fail or return `Ok(None)` when the contract does not
/// expose the value. Callers bound each call with a timeout.
#[async_trait]
pub trait TokenMetadataProvider: Send + Sync {
    async fn decimals(&self, token: Address) -> Result<Option<u8>, MetadataError>;

    async fn name(&self, token: Address) -> Result<Option<String>, MetadataError>;

    async fn symbol(&self, token: Address) -> Result<Option<String>, MetadataError>;
}

/// Provider that knows nothing. Transfers keep only their raw amount.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

#[async_trait]
impl TokenMetadataProvider for NoMetadata {
    async fn decimals(&self, _token: Address) -> Result<Option<u8>, MetadataError> {
        Ok(None)
    }

    async fn name(&self, _token: Address) -> Result<Option<String>, MetadataError> {
        Ok(None)
    }

    async fn symbol(&self, _token: Address) -> Result<Option<String>, MetadataError> {
        Ok(None)
    }
}
