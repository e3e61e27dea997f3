//! Live daemon status via RPC.
//!
//! [`StatusPoller::poll`] never fails: an unreachable daemon yields an
//! "offline" [`NodeStats`]. Concurrent polls are collapsed into one request;
//! callers that queued behind an in-flight poll get its snapshot.

pub mod format;
mod stats;

pub use stats::{DaemonVersionInfo, NodeStats, OFFLINE};

use crate::error::Result;
use crate::rpc::DaemonRpcClient;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Polls one daemon's RPC endpoint.
#[derive(Debug)]
pub struct StatusPoller {
    client: DaemonRpcClient,
    /// Held for the duration of a poll.
    in_flight: tokio::sync::Mutex<()>,
    /// Number of completed polls.
    generation: AtomicU64,
    last_stats: Mutex<Option<NodeStats>>,
    version_info: Mutex<Option<DaemonVersionInfo>>,
}

impl StatusPoller {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Ok(Self::with_client(DaemonRpcClient::new(host, port)?))
    }

    pub fn with_client(client: DaemonRpcClient) -> Self {
        Self {
            client,
            in_flight: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            last_stats: Mutex::new(None),
            version_info: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Fetch a fresh snapshot, or share the one an in-flight poll produces.
    pub async fn poll(&self) -> NodeStats {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.in_flight.lock().await;

        if self.generation.load(Ordering::Acquire) != seen {
            if let Some(stats) = self.last_stats() {
                debug!("Joined in-flight poll");
                return stats;
            }
        }

        let stats = self.fetch_stats().await;
        *self
            .last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(stats.clone());
        self.generation.fetch_add(1, Ordering::Release);
        stats
    }

    async fn fetch_stats(&self) -> NodeStats {
        let info = match self.client.call_opt("get_info", None).await {
            Some(info) if info.as_object().is_some_and(|o| !o.is_empty()) => info,
            _ => {
                debug!("Daemon at {} is offline", self.client.base_url());
                return NodeStats::default();
            }
        };

        let mut stats = NodeStats::from_info(&info);
        if stats.busy_syncing {
            return stats;
        }

        if let Some(net_stats) = self.client.get_opt("get_net_stats").await {
            stats.apply_net_stats(&net_stats);
        }
        if let Some(header) = self.client.call_opt("get_last_block_header", None).await {
            stats.apply_last_block_header(&header);
        }
        if let Some(fee) = self.client.call_opt("get_fee_estimate", None).await {
            stats.apply_fee_estimate(&fee);
        }

        stats
    }

    /// Ask the daemon about its own version and pending updates.
    pub async fn check_update(&self) -> DaemonVersionInfo {
        let info = self.client.call_opt("get_info", None).await;
        let update = self
            .client
            .call_opt("get_update", Some(json!({ "command": "check" })))
            .await;

        let version = DaemonVersionInfo::from_results(info.as_ref(), update.as_ref());
        *self
            .version_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(version.clone());
        version
    }

    pub fn last_stats(&self) -> Option<NodeStats> {
        self.last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn version_info(&self) -> Option<DaemonVersionInfo> {
        self.version_info
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
