//! Minimal HTTP transport for the daemon's RPC interface.
//!
//! Only what status polling needs: JSON-RPC 2.0 calls against `/json_rpc`
//! and plain GETs of the "other" endpoints such as `/get_net_stats`.
//! The `*_opt` wrappers turn every failure into `None`, which is how the
//! poller treats an unreachable or misbehaving daemon.

use crate::config::{AppConfig, NetworkConfig};
use crate::error::{NodeKeeperError, Result};
use serde_json::{json, Value};
use tracing::debug;

fn net_err(message: String) -> NodeKeeperError {
    NodeKeeperError::Network {
        message,
        cause: None,
    }
}

/// HTTP client bound to one daemon RPC endpoint.
#[derive(Debug, Clone)]
pub struct DaemonRpcClient {
    base_url: String,
    client: reqwest::Client,
}

impl DaemonRpcClient {
    /// Client for `http://<host>:<port>`.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        Self::from_base_url(&format!("http://{}:{}", host, port))
    }

    pub fn from_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| net_err(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a JSON-RPC call and return its `result` member.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let url = format!("{}/json_rpc", self.base_url);
        let mut body = json!({
            "jsonrpc": "2.0",
            "id": "0",
            "method": method,
        });
        if let Some(params) = params {
            body["params"] = params;
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| net_err(format!("{} at {} failed: {}", method, url, e)))?;

        if !response.status().is_success() {
            return Err(net_err(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let mut payload: Value = response
            .json()
            .await
            .map_err(|e| NodeKeeperError::Parse {
                what: format!("{} response", method),
                message: e.to_string(),
            })?;

        if let Some(error) = payload.get("error") {
            return Err(NodeKeeperError::Other(format!(
                "{} returned an error: {}",
                method, error
            )));
        }

        match payload.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(NodeKeeperError::Parse {
                what: format!("{} response", method),
                message: "missing result".into(),
            }),
        }
    }

    /// GET `/<endpoint>` and decode the JSON body.
    pub async fn get(&self, endpoint: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| net_err(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(net_err(format!(
                "GET {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        response.json().await.map_err(|e| NodeKeeperError::Parse {
            what: url,
            message: e.to_string(),
        })
    }

    /// [`call`](Self::call), with failures logged and mapped to `None`.
    pub async fn call_opt(&self, method: &str, params: Option<Value>) -> Option<Value> {
        match self.call(method, params).await {
            Ok(result) => Some(result),
            Err(e) => {
                debug!("RPC {} failed: {}", method, e);
                None
            }
        }
    }

    /// [`get`](Self::get), with failures logged and mapped to `None`.
    pub async fn get_opt(&self, endpoint: &str) -> Option<Value> {
        match self.get(endpoint).await {
            Ok(body) => Some(body),
            Err(e) => {
                debug!("RPC {} failed: {}", endpoint, e);
                None
            }
        }
    }
}
