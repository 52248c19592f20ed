//! HTTP JSON-RPC client backed by `reqwest`, with retry on transient errors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::RpcTransport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 { 30_000 }

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl HttpRpcClient {
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, RpcError> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RpcError::Http(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
            retry: RetryPolicy::new(config.retry),
            request_timeout,
        })
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    RpcError::Http(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(RpcError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| RpcError::UnexpectedResponse(e.to_string()))
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(&req).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    match self.retry.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                url = %self.url,
                                method = %req.method,
                                "retrying request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            tracing::error!(attempt, error = %e, url = %self.url, "max retries exceeded");
                            return Err(e);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::call;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const OK_BODY: &str = r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#;

    /// Read one HTTP request (headers plus `Content-Length` body).
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Serve one connection per entry: `None` hangs up without answering,
    /// `Some((status, body))` answers and closes.
    async fn serve(script: Vec<Option<(u16, &'static str)>>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));
        let seen = connections.clone();
        tokio::spawn(async move {
            for step in script {
                let (mut stream, _) = listener.accept().await.unwrap();
                seen.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream).await;
                if let Some((status, body)) = step {
                    let response = format!(
                        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.flush().await.unwrap();
                }
            }
        });
        (url, connections)
    }

    fn client(url: &str, max_retries: u32) -> HttpRpcClient {
        HttpRpcClient::new(
            url,
            HttpClientConfig {
                retry: RetryConfig {
                    max_retries,
                    initial_backoff_ms: 1,
                    max_backoff_ms: 5,
                },
                request_timeout_ms: 5_000,
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn dropped_connection_is_retried() {
        let (url, connections) = serve(vec![None, Some((200, OK_BODY))]).await;
        let block: String = call(&client(&url, 2), "eth_blockNumber", vec![]).await.unwrap();
        assert_eq!(block, "0x10");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let unavailable = Some((503, "busy"));
        let (url, connections) = serve(vec![unavailable; 3]).await;
        let err = call::<String, _>(&client(&url, 2), "eth_blockNumber", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Http(ref m) if m.contains("503")), "{err}");
        assert_eq!(connections.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn node_errors_are_not_retried() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid params"}}"#;
        let (url, connections) = serve(vec![Some((200, body))]).await;
        let err = call::<String, _>(&client(&url, 3), "eth_getLogs", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Rpc(_)));
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }
}
