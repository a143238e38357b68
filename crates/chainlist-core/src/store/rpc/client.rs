//! JSON-RPC plumbing
//!
//! `RpcTransport` is the seam between the ledger and the wire: `HttpTransport`
//! posts JSON-RPC 2.0 requests with reqwest, tests substitute a scripted
//! transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::StoreError;

/// EIP-1193: the user rejected the request
pub const USER_REJECTED: i64 = 4001;
/// JSON-RPC: method not found
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Per-request timeout in seconds
const REQUEST_TIMEOUT: u64 = 30;

/// Sends one JSON-RPC request and returns its `result`
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, StoreError>;
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC over HTTP
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .user_agent(concat!("chainlist/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport(format!("could not build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(id, method, %params, "JSON-RPC request");

        let response = self
            .http
            .post(&self.url)
            .json(&Request {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|e| StoreError::Transport(format!("{} ({})", e, self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Transport(format!(
                "HTTP {} from {}",
                status, self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        parse_response(&body)
    }
}

/// Turn a JSON-RPC response body into its result or error
pub(crate) fn parse_response(body: &str) -> Result<Value, StoreError> {
    let response: Response = serde_json::from_str(body)
        .map_err(|e| StoreError::Decode(format!("invalid JSON-RPC response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(StoreError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Typed calls over a transport
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, StoreError> {
        let value = self.transport.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| StoreError::Decode(format!("unexpected result for {}: {}", method, e)))
    }
}
