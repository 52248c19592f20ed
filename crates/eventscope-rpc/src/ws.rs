//! WebSocket JSON-RPC client with `eth_subscribe` support.
//!
//! A background task owns the socket. Callers talk to it through a command
//! channel; responses are matched to requests by id and subscription
//! notifications are routed to per-subscription channels.
//!
//! There is no reconnect: when the socket drops, pending requests fail and
//! every subscription channel closes, so consumers observe the end of their
//! stream and can report it.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId};
use crate::transport::{call, RpcTransport};

/// A subscription id returned by `eth_subscribe`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type ResponseTx = oneshot::Sender<Result<JsonRpcResponse, RpcError>>;
type SubscriptionRx = mpsc::UnboundedReceiver<Value>;
type SubscribeTx = oneshot::Sender<Result<(SubscriptionId, SubscriptionRx), RpcError>>;

enum Pending {
    Call(ResponseTx),
    Subscribe(SubscribeTx),
}

impl Pending {
    fn fail(self, err: RpcError) {
        match self {
            Pending::Call(tx) => {
                let _ = tx.send(Err(err));
            }
            Pending::Subscribe(tx) => {
                let _ = tx.send(Err(err));
            }
        }
    }
}

enum WsCommand {
    Call { req: JsonRpcRequest, tx: ResponseTx },
    Subscribe { req: JsonRpcRequest, tx: SubscribeTx },
    Forget(SubscriptionId),
    Close,
}

/// WebSocket JSON-RPC client.
pub struct WsRpcClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
}

impl WsRpcClient {
    /// Open the socket and start the background task.
    pub async fn connect(url: impl Into<String>) -> Result<Self, RpcError> {
        let url = url.into();
        tracing::info!(url = %url, "connecting via WebSocket");
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| RpcError::WebSocket(format!("{url}: {e}")))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task_url = url.clone();
        tokio::spawn(async move {
            ws_task(task_url, ws_stream, cmd_rx).await;
        });

        Ok(Self { url, cmd_tx })
    }

    /// `eth_subscribe(kind, params...)`. Notifications arrive on the returned
    /// receiver, which closes when the subscription or the socket ends.
    pub async fn subscribe(
        &self,
        kind: &str,
        params: Vec<Value>,
    ) -> Result<(SubscriptionId, SubscriptionRx), RpcError> {
        let params = std::iter::once(Value::String(kind.to_string()))
            .chain(params)
            .collect();
        let req = JsonRpcRequest::new("eth_subscribe", params);
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Subscribe { req, tx })
            .map_err(|_| RpcError::WebSocket("WS task closed".into()))?;
        rx.await
            .map_err(|_| RpcError::WebSocket("WS response dropped".into()))?
    }

    /// Stop local delivery, then `eth_unsubscribe` on the node.
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> Result<bool, RpcError> {
        let _ = self.cmd_tx.send(WsCommand::Forget(id.clone()));
        call(self, "eth_unsubscribe", vec![Value::String(id.0.clone())]).await
    }

    /// Close the socket. Pending requests fail and subscriptions end.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

impl Drop for WsRpcClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl RpcTransport for WsRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Call { req, tx })
            .map_err(|_| RpcError::WebSocket("WS task closed".into()))?;
        rx.await
            .map_err(|_| RpcError::WebSocket("WS response dropped".into()))?
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Default)]
struct Router {
    pending: HashMap<u64, Pending>,
    subscriptions: HashMap<SubscriptionId, mpsc::UnboundedSender<Value>>,
}

impl Router {
    fn track(&mut self, req: &JsonRpcRequest, pending: Pending) -> bool {
        match req.numeric_id() {
            Some(id) => {
                self.pending.insert(id, pending);
                true
            }
            None => {
                pending.fail(RpcError::UnexpectedResponse("request without numeric id".into()));
                false
            }
        }
    }

    /// Route one text frame from the node.
    fn handle_message(&mut self, text: &str) {
        let Ok(val) = serde_json::from_str::<Value>(text) else {
            tracing::debug!("failed to parse WS message as JSON");
            return;
        };

        if val.get("method").and_then(Value::as_str) == Some("eth_subscription") {
            let params = &val["params"];
            if let Some(id) = params["subscription"].as_str() {
                let id = SubscriptionId(id.to_string());
                let delivered = self
                    .subscriptions
                    .get(&id)
                    .map(|tx| tx.send(params["result"].clone()).is_ok());
                if delivered == Some(false) {
                    // receiver dropped
                    self.subscriptions.remove(&id);
                }
            }
            return;
        }

        let Ok(resp) = serde_json::from_value::<JsonRpcResponse>(val) else {
            tracing::debug!("ignoring WS message that is neither response nor notification");
            return;
        };
        let RpcId::Number(id) = resp.id else {
            return;
        };
        match self.pending.remove(&id) {
            Some(Pending::Call(tx)) => {
                let _ = tx.send(Ok(resp));
            }
            Some(Pending::Subscribe(tx)) => {
                // register before any later frame is read so no notification is lost
                let outcome = match resp.into_result() {
                    Ok(Value::String(sub)) => {
                        let sub_id = SubscriptionId(sub);
                        let (sub_tx, sub_rx) = mpsc::unbounded_channel();
                        self.subscriptions.insert(sub_id.clone(), sub_tx);
                        Ok((sub_id, sub_rx))
                    }
                    Ok(other) => Err(RpcError::UnexpectedResponse(format!(
                        "eth_subscribe returned {other}"
                    ))),
                    Err(e) => Err(RpcError::Rpc(e)),
                };
                let _ = tx.send(outcome);
            }
            None => tracing::debug!(id, "response for unknown request id"),
        }
    }

    fn shutdown(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.fail(RpcError::WebSocket("connection closed".into()));
        }
        self.subscriptions.clear();
    }
}

async fn ws_task<S>(
    url: String,
    ws_stream: S,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
) where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut sink, mut stream) = ws_stream.split();
    let mut router = Router::default();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let (req, pending) = match cmd {
                    None | Some(WsCommand::Close) => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    Some(WsCommand::Forget(id)) => {
                        router.subscriptions.remove(&id);
                        continue;
                    }
                    Some(WsCommand::Call { req, tx }) => (req, Pending::Call(tx)),
                    Some(WsCommand::Subscribe { req, tx }) => (req, Pending::Subscribe(tx)),
                };
                let msg = match serde_json::to_string(&req) {
                    Ok(msg) => msg,
                    Err(e) => {
                        pending.fail(RpcError::Deserialization(e));
                        continue;
                    }
                };
                if !router.track(&req, pending) {
                    continue;
                }
                if let Err(e) = sink.send(Message::Text(msg.into())).await {
                    tracing::warn!(error = %e, url = %url, "WS send failed");
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    None => break,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, url = %url, "WS receive error");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => router.handle_message(text.as_str()),
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(url = %url, "WebSocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    router.shutdown();
    tracing::info!(url = %url, "WebSocket task ended");
}
