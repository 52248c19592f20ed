//! eventscope-rpc: talks to an Ethereum JSON-RPC node.
//!
//! - [`HttpRpcClient`] / [`WsRpcClient`]: transports implementing [`RpcTransport`]
//! - [`EthNode`]: the `NodeClient` used by the historical poller and live subscriber
//! - [`Erc20Metadata`]: `decimals()/name()/symbol()` through `eth_call`

pub mod codec;
pub mod erc20;
pub mod error;
pub mod http;
pub mod node;
pub mod request;
pub mod retry;
pub mod transport;
pub mod ws;

#[cfg(test)]
mod testing;

pub use erc20::Erc20Metadata;
pub use error::RpcError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use node::EthNode;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use retry::{RetryConfig, RetryPolicy};
pub use transport::{call, RpcTransport};
pub use ws::{SubscriptionId, WsRpcClient};
