//! The `RpcTransport` trait: one JSON-RPC round trip, any wire.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// An async JSON-RPC transport.
///
/// Object-safe; stored as `Arc<dyn RpcTransport>` by [`EthNode`](crate::EthNode)
/// and [`Erc20Metadata`](crate::Erc20Metadata).
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError>;

    /// Endpoint URL, for logs and errors.
    fn url(&self) -> &str;

    /// Call `method` and return the raw result value.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let resp = self.send(JsonRpcRequest::new(method, params)).await?;
        resp.into_result().map_err(RpcError::Rpc)
    }
}

/// Call `method` and deserialize the result.
pub async fn call<T, R>(transport: &R, method: &str, params: Vec<Value>) -> Result<T, RpcError>
where
    T: DeserializeOwned,
    R: RpcTransport + ?Sized,
{
    let value = transport.request(method, params).await?;
    serde_json::from_value(value).map_err(RpcError::Deserialization)
}
