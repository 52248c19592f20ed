//! [`NodeClient`] over JSON-RPC.

use std::sync::Arc;

use async_trait::async_trait;
use eventscope_core::{LogFilter, LogRecord, LogSubscription, NodeClient, TransportError};
use futures::StreamExt;
use serde_json::Value;

use crate::codec::{filter_to_json, log_from_json, logs_from_json, parse_quantity, subscription_filter_to_json};
use crate::transport::{call, RpcTransport};
use crate::ws::{SubscriptionId, WsRpcClient};

/// An Ethereum node reached over JSON-RPC.
///
/// Requests go through `rpc` (HTTP or WebSocket). Subscriptions need a
/// WebSocket client; without one `subscribe_logs` fails.
pub struct EthNode {
    rpc: Arc<dyn RpcTransport>,
    ws: Option<Arc<WsRpcClient>>,
}

impl EthNode {
    pub fn new(rpc: Arc<dyn RpcTransport>) -> Self {
        Self { rpc, ws: None }
    }

    /// Node that uses one WebSocket connection for both requests and subscriptions.
    pub fn websocket(ws: Arc<WsRpcClient>) -> Self {
        Self {
            rpc: ws.clone(),
            ws: Some(ws),
        }
    }

    fn subscriber(&self) -> Result<&WsRpcClient, TransportError> {
        self.ws.as_deref().ok_or_else(|| {
            TransportError::Other("log subscriptions need a WebSocket endpoint".into())
        })
    }
}

#[async_trait]
impl NodeClient for EthNode {
    async fn current_block_number(&self) -> Result<u64, TransportError> {
        let hex: String = call(self.rpc.as_ref(), "eth_blockNumber", vec![]).await?;
        Ok(parse_quantity(&hex)?)
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, TransportError> {
        let result = self
            .rpc
            .request("eth_getLogs", vec![filter_to_json(filter)])
            .await?;
        Ok(logs_from_json(result)?)
    }

    async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription, TransportError> {
        let ws = self.subscriber()?;
        let (id, rx) = ws
            .subscribe("logs", vec![subscription_filter_to_json(filter)])
            .await?;
        tracing::info!(subscription = %id, url = %ws.url(), "log subscription opened");

        let source = id.0.clone();
        let mut rx = rx;
        let notifications = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));
        let stream = notifications.filter_map(move |value: Value| {
            let source = source.clone();
            async move {
                match log_from_json(value) {
                    Ok(Some(record)) => Some(Ok(record.with_source(source))),
                    Ok(None) => None,
                    Err(e) => Some(Err(TransportError::from(e))),
                }
            }
        });

        Ok(LogSubscription {
            id: id.0,
            stream: Box::pin(stream),
        })
    }

    async fn unsubscribe(&self, id: &str) -> Result<bool, TransportError> {
        let ws = self.subscriber()?;
        let removed = ws.unsubscribe(&SubscriptionId(id.to_string())).await?;
        tracing::info!(subscription = %id, removed, "log subscription cancelled");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use alloy_primitives::Address;
    use serde_json::json;

    fn node(transport: ScriptedTransport) -> (EthNode, Arc<ScriptedTransport>) {
        let transport = Arc::new(transport);
        (EthNode::new(transport.clone()), transport)
    }

    #[tokio::test]
    async fn block_number_is_parsed() {
        let (node, _) = node(ScriptedTransport::default().on("eth_blockNumber", json!("0x12a05f2")));
        assert_eq!(node.current_block_number().await.unwrap(), 19_555_826);
    }

    #[tokio::test]
    async fn get_logs_sends_filter_and_decodes() {
        let (node, transport) = node(ScriptedTransport::default().on(
            "eth_getLogs",
            json!([{
                "address": "0x2222222222222222222222222222222222222222",
                "topics": ["0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925"],
                "data": "0x",
                "blockNumber": "0x64",
                "logIndex": "0x0",
                "removed": false
            }]),
        ));
        let filter = LogFilter::all().from_block(90).to_block(100).address(Address::repeat_byte(0x22));
        let logs = node.get_logs(&filter).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, 100);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, "eth_getLogs");
        assert_eq!(sent.params[0]["fromBlock"], "0x5a");
        assert_eq!(sent.params[0]["toBlock"], "0x64");
    }

    #[tokio::test]
    async fn rpc_error_becomes_transport_error() {
        let (node, _) = node(ScriptedTransport::default().fail(
            "eth_getLogs",
            -32005,
            "query returned more than 10000 results",
        ));
        let err = node.get_logs(&LogFilter::all()).await.unwrap_err();
        assert!(matches!(err, TransportError::Rpc(ref m) if m.contains("10000")));
    }

    #[tokio::test]
    async fn subscriptions_need_websocket() {
        let (node, _) = node(ScriptedTransport::default());
        let err = node.subscribe_logs(&LogFilter::all()).await.unwrap_err();
        assert!(matches!(err, TransportError::Other(_)));
        assert!(node.unsubscribe("0x1").await.is_err());
    }
}
