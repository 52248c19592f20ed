//! Scripted in-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RpcError;
use crate::request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Answers each method with a fixed result (or error) and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    results: HashMap<String, Result<Value, JsonRpcError>>,
    seen: Mutex<Vec<JsonRpcRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn on(mut self, method: &str, result: Value) -> Self {
        self.results.insert(method.to_string(), Ok(result));
        self
    }

    pub(crate) fn fail(mut self, method: &str, code: i64, message: &str) -> Self {
        self.results.insert(
            method.to_string(),
            Err(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        );
        self
    }

    pub(crate) fn requests(&self) -> Vec<JsonRpcRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        self.seen.lock().unwrap().push(req.clone());
        let scripted = self
            .results
            .get(&req.method)
            .cloned()
            .ok_or_else(|| RpcError::Http(format!("no script for {}", req.method)))?;
        let (result, error) = match scripted {
            Ok(v) => (Some(v), None),
            Err(e) => (None, Some(e)),
        };
        Ok(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: req.id,
            result,
            error,
        })
    }

    fn url(&self) -> &str {
        "mock://node"
    }
}
