//! ERC-20 `decimals()`, `name()` and `symbol()` through `eth_call`.

use std::sync::Arc;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eventscope_core::{MetadataError, TokenMetadataProvider};
use serde_json::json;

use crate::transport::{call, RpcTransport};

const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];
const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];

/// Token metadata read from the token contract itself.
///
/// An empty return yields `Ok(None)`. Reverts and transport failures are
/// reported as [`MetadataError::Call`].
pub struct Erc20Metadata {
    rpc: Arc<dyn RpcTransport>,
}

impl Erc20Metadata {
    pub fn new(rpc: Arc<dyn RpcTransport>) -> Self {
        Self { rpc }
    }

    async fn eth_call(&self, token: Address, selector: [u8; 4]) -> Result<Bytes, MetadataError> {
        let params = vec![
            json!({ "to": token, "data": format!("0x{}", hex::encode(selector)) }),
            json!("latest"),
        ];
        call::<Bytes, _>(self.rpc.as_ref(), "eth_call", params)
            .await
            .map_err(|e| MetadataError::Call(e.to_string()))
    }

    async fn string_call(
        &self,
        token: Address,
        selector: [u8; 4],
    ) -> Result<Option<String>, MetadataError> {
        let out = self.eth_call(token, selector).await?;
        if out.is_empty() {
            return Ok(None);
        }
        decode_string(&out).map(Some)
    }
}

#[async_trait]
impl TokenMetadataProvider for Erc20Metadata {
    async fn decimals(&self, token: Address) -> Result<Option<u8>, MetadataError> {
        let out = self.eth_call(token, DECIMALS_SELECTOR).await?;
        if out.is_empty() {
            return Ok(None);
        }
        decode_decimals(&out).map(Some)
    }

    async fn name(&self, token: Address) -> Result<Option<String>, MetadataError> {
        self.string_call(token, NAME_SELECTOR).await
    }

    async fn symbol(&self, token: Address) -> Result<Option<String>, MetadataError> {
        self.string_call(token, SYMBOL_SELECTOR).await
    }
}

fn decode_decimals(out: &[u8]) -> Result<u8, MetadataError> {
    let word = out.get(..32).ok_or_else(|| {
        MetadataError::InvalidResponse(format!("decimals() returned {} bytes", out.len()))
    })?;
    let value = U256::from_be_slice(word);
    if value > U256::from(u8::MAX) {
        return Err(MetadataError::InvalidResponse(format!(
            "decimals() out of range: {value}"
        )));
    }
    Ok(value.as_limbs()[0] as u8)
}

/// ABI `string`, falling back to a NUL-padded `bytes32` (MKR, SAI and friends).
fn decode_string(out: &[u8]) -> Result<String, MetadataError> {
    if let Ok(DynSolValue::String(s)) = DynSolType::String.abi_decode(out) {
        return Ok(s);
    }
    if out.len() == 32 {
        let end = out.iter().position(|b| *b == 0).unwrap_or(out.len());
        return String::from_utf8(out[..end].to_vec())
            .map_err(|e| MetadataError::InvalidResponse(format!("bytes32 string: {e}")));
    }
    Err(MetadataError::InvalidResponse(format!(
        "cannot decode {} bytes as string",
        out.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    fn abi_string(s: &str) -> String {
        let encoded = DynSolValue::String(s.into()).abi_encode();
        format!("0x{}", hex::encode(encoded))
    }

    fn provider(transport: ScriptedTransport) -> (Erc20Metadata, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (Erc20Metadata::new(transport.clone()), transport)
    }

    #[tokio::test]
    async fn reads_decimals() {
        let (meta, transport) = provider(ScriptedTransport::default().on(
            "eth_call",
            json!("0x0000000000000000000000000000000000000000000000000000000000000006"),
        ));
        let token = Address::repeat_byte(0xaa);
        assert_eq!(meta.decimals(token).await.unwrap(), Some(6));

        let req = &transport.requests()[0];
        assert_eq!(req.params[0]["data"], "0x313ce567");
        assert_eq!(req.params[1], "latest");
    }

    #[tokio::test]
    async fn empty_return_is_unknown() {
        let (meta, _) = provider(ScriptedTransport::default().on("eth_call", json!("0x")));
        let token = Address::repeat_byte(0xaa);
        assert_eq!(meta.decimals(token).await.unwrap(), None);
        assert_eq!(meta.symbol(token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn decodes_abi_string() {
        let (meta, _) =
            provider(ScriptedTransport::default().on("eth_call", json!(abi_string("USD Coin"))));
        assert_eq!(
            meta.name(Address::repeat_byte(1)).await.unwrap().as_deref(),
            Some("USD Coin")
        );
    }

    #[test]
    fn bytes32_fallback() {
        let mut word = [0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_string(&word).unwrap(), "MKR");
    }

    #[test]
    fn decimals_out_of_range() {
        let mut word = [0u8; 32];
        word[30] = 1;
        assert!(matches!(
            decode_decimals(&word),
            Err(MetadataError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn reverted_call_is_a_call_error() {
        let (meta, _) =
            provider(ScriptedTransport::default().fail("eth_call", 3, "execution reverted"));
        let err = meta.decimals(Address::ZERO).await.unwrap_err();
        assert!(matches!(err, MetadataError::Call(ref m) if m.contains("execution reverted")));
    }
}
