//! Snapshot types built from daemon RPC payloads.

use super::format;
use crate::config::NetworkConfig;
use serde::Serialize;
use serde_json::Value;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Status reported when the daemon could not be reached.
pub const OFFLINE: &str = "offline";

/// One poll's view of the daemon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    /// `"offline"` or the status string the daemon reported (usually `OK`).
    pub status: String,
    pub height: u64,
    pub target_height: u64,
    pub synchronized: bool,
    pub busy_syncing: bool,
    pub incoming_connections: u64,
    pub outgoing_connections: u64,
    pub white_peerlist_size: u64,
    pub grey_peerlist_size: u64,
    pub database_size: u64,
    pub free_space: u64,
    pub version: String,
    pub update_available: bool,
    pub nettype: String,
    pub difficulty: u64,
    pub tx_count: u64,
    pub tx_pool_size: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Atomic units.
    pub block_reward: u64,
    pub block_timestamp: u64,
    /// Atomic units per byte.
    pub fee_estimate: u64,
    /// Network hashrate in H/s, derived from difficulty.
    pub hashrate: u64,
}

impl Default for NodeStats {
    fn default() -> Self {
        Self {
            status: OFFLINE.to_string(),
            height: 0,
            target_height: 0,
            synchronized: false,
            busy_syncing: false,
            incoming_connections: 0,
            outgoing_connections: 0,
            white_peerlist_size: 0,
            grey_peerlist_size: 0,
            database_size: 0,
            free_space: 0,
            version: String::new(),
            update_available: false,
            nettype: "mainnet".to_string(),
            difficulty: 0,
            tx_count: 0,
            tx_pool_size: 0,
            bytes_in: 0,
            bytes_out: 0,
            block_reward: 0,
            block_timestamp: 0,
            fee_estimate: 0,
            hashrate: 0,
        }
    }
}

impl NodeStats {
    /// Build from a `get_info` result. Missing fields stay at their default.
    pub fn from_info(info: &Value) -> Self {
        let height = u64_field(info, "height");
        let target_height = match u64_field(info, "target_height") {
            // Reported as 0 once synced
            0 => height,
            target => target,
        };
        let difficulty = u64_field(info, "difficulty");

        Self {
            status: str_field(info, "status").unwrap_or("unknown").to_string(),
            height,
            target_height,
            synchronized: bool_field(info, "synchronized"),
            busy_syncing: bool_field(info, "busy_syncing"),
            incoming_connections: u64_field(info, "incoming_connections_count"),
            outgoing_connections: u64_field(info, "outgoing_connections_count"),
            white_peerlist_size: u64_field(info, "white_peerlist_size"),
            grey_peerlist_size: u64_field(info, "grey_peerlist_size"),
            database_size: u64_field(info, "database_size"),
            free_space: u64_field(info, "free_space"),
            version: str_field(info, "version").unwrap_or_default().to_string(),
            update_available: bool_field(info, "update_available"),
            nettype: str_field(info, "nettype").unwrap_or("mainnet").to_string(),
            difficulty,
            tx_count: u64_field(info, "tx_count"),
            tx_pool_size: u64_field(info, "tx_pool_size"),
            hashrate: difficulty / NetworkConfig::TARGET_BLOCK_TIME_SECS,
            ..Self::default()
        }
    }

    /// Merge a `/get_net_stats` body.
    pub fn apply_net_stats(&mut self, net_stats: &Value) {
        self.bytes_in = u64_field(net_stats, "total_bytes_in");
        self.bytes_out = u64_field(net_stats, "total_bytes_out");
    }

    /// Merge a `get_last_block_header` result.
    pub fn apply_last_block_header(&mut self, result: &Value) {
        if let Some(header) = result.get("block_header") {
            self.block_reward = u64_field(header, "reward");
            self.block_timestamp = u64_field(header, "timestamp");
        }
    }

    /// Merge a `get_fee_estimate` result.
    pub fn apply_fee_estimate(&mut self, result: &Value) {
        self.fee_estimate = u64_field(result, "fee");
    }

    pub fn is_offline(&self) -> bool {
        self.status == OFFLINE
    }

    pub fn total_connections(&self) -> u64 {
        self.incoming_connections + self.outgoing_connections
    }

    /// Percentage of the chain downloaded.
    pub fn sync_progress(&self) -> f64 {
        if self.synchronized {
            100.0
        } else if self.target_height == 0 {
            0.0
        } else {
            self.height as f64 / self.target_height as f64 * 100.0
        }
    }

    pub fn blocks_remaining(&self) -> u64 {
        if self.synchronized {
            0
        } else {
            self.target_height.saturating_sub(self.height)
        }
    }

    pub fn database_size_gib(&self) -> f64 {
        self.database_size as f64 / GIB
    }

    pub fn free_space_gib(&self) -> f64 {
        self.free_space as f64 / GIB
    }

    pub fn bytes_in_mib(&self) -> f64 {
        self.bytes_in as f64 / MIB
    }

    pub fn bytes_out_mib(&self) -> f64 {
        self.bytes_out as f64 / MIB
    }

    pub fn difficulty_display(&self) -> String {
        format::difficulty(self.difficulty)
    }

    pub fn hashrate_display(&self) -> String {
        format::hashrate(self.hashrate)
    }

    pub fn fee_display(&self) -> String {
        format::fee(self.fee_estimate)
    }

    pub fn block_reward_display(&self) -> String {
        format::block_reward(self.block_reward)
    }
}

/// Result of [`StatusPoller::check_update`](super::StatusPoller::check_update).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonVersionInfo {
    pub current_version: String,
    pub update_available: bool,
    pub latest_version: String,
    pub download_url: String,
}

impl DaemonVersionInfo {
    /// Combine `get_info` and `get_update` results. `get_update`'s flag wins.
    pub fn from_results(info: Option<&Value>, update: Option<&Value>) -> Self {
        let mut version = Self::default();
        if let Some(info) = info {
            version.current_version = str_field(info, "version").unwrap_or_default().to_string();
            version.update_available = bool_field(info, "update_available");
        }
        if let Some(update) = update {
            version.update_available = bool_field(update, "update");
            version.latest_version = str_field(update, "version").unwrap_or_default().to_string();
            version.download_url = str_field(update, "user_uri").unwrap_or_default().to_string();
        }
        version
    }
}

fn u64_field(value: &Value, key: &str) -> u64 {
    match value.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}
