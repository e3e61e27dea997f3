//! Typed daemon settings.
//!
//! One struct per settings section. Every field's `Default` is its documented
//! default, which matches `monerod`'s own default so that
//! [`to_daemon_args`] can leave the flag out without changing behavior.
//!
//! All sections are `#[serde(default)]`: a persisted file only needs to carry
//! the keys the user changed.

mod translate;

pub use translate::to_daemon_args;

use crate::config::NetworkConfig;
use crate::error::{NodeKeeperError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

/// Which Monero network the daemon joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    #[default]
    Mainnet,
    Testnet,
    Stagenet,
}

/// TLS mode of the daemon's RPC server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcSslMode {
    #[default]
    Autodetect,
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub network_type: NetworkType,
    pub offline: bool,
    pub no_sync: bool,
    pub public_node: bool,
    pub sync_pruned_blocks: bool,
    pub pad_transactions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pSettings {
    pub bind_ip: String,
    pub bind_port: u16,
    pub use_ipv6: bool,
    pub external_port: u16,
    pub out_peers: i32,
    pub in_peers: i32,
    pub max_connections_per_ip: u32,
    pub hide_my_port: bool,
    pub allow_local_ip: bool,
    /// Comma-separated `host:port` list.
    pub priority_nodes: String,
    /// Comma-separated `host:port` list.
    pub exclusive_nodes: String,
    /// Comma-separated `host:port` list.
    pub seed_nodes: String,
    /// Path to a ban list file.
    pub ban_list: String,
}

impl Default for P2pSettings {
    fn default() -> Self {
        Self {
            bind_ip: "0.0.0.0".into(),
            bind_port: 18080,
            use_ipv6: false,
            external_port: 0,
            out_peers: -1,
            in_peers: -1,
            max_connections_per_ip: 1,
            hide_my_port: false,
            allow_local_ip: false,
            priority_nodes: String::new(),
            exclusive_nodes: String::new(),
            seed_nodes: String::new(),
            ban_list: String::new(),
        }
    }
}

/// Rate limits in kB/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthSettings {
    pub limit_rate_up: u64,
    pub limit_rate_down: u64,
}

impl Default for BandwidthSettings {
    fn default() -> Self {
        Self {
            limit_rate_up: 8192,
            limit_rate_down: 32768,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub bind_ip: String,
    pub bind_port: u16,
    pub restricted_bind_ip: String,
    pub restricted_bind_port: u16,
    pub restricted: bool,
    pub use_ipv6: bool,
    /// `user:password`
    pub login: String,
    pub confirm_external_bind: bool,
    pub access_control_origins: String,
    pub max_connections: u32,
    pub disable_ban: bool,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            bind_ip: NetworkConfig::DEFAULT_RPC_HOST.into(),
            bind_port: NetworkConfig::DEFAULT_RPC_PORT,
            restricted_bind_ip: "127.0.0.1".into(),
            restricted_bind_port: 0,
            restricted: false,
            use_ipv6: false,
            login: String::new(),
            confirm_external_bind: false,
            access_control_origins: String::new(),
            max_connections: 100,
            disable_ban: false,
        }
    }
}

impl RpcSettings {
    /// Host and port a local poller should connect to.
    ///
    /// A wildcard or unparsable bind address is reached through loopback.
    pub fn poll_address(&self) -> (String, u16) {
        let host = match self.bind_ip.parse::<IpAddr>() {
            Ok(ip) if !ip.is_unspecified() => ip.to_string(),
            _ => Ipv4Addr::LOCALHOST.to_string(),
        };
        (host, self.bind_port)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSslSettings {
    pub mode: RpcSslMode,
    pub private_key: String,
    pub certificate: String,
    pub ca_certificates: String,
    pub allow_any_cert: bool,
    pub allow_chained: bool,
}

/// ZMQ notification interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    pub disabled: bool,
    pub bind_ip: String,
    pub bind_port: u16,
    /// e.g. `tcp://127.0.0.1:18083`
    #[serde(rename = "pub")]
    pub publish: String,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            bind_ip: "127.0.0.1".into(),
            bind_port: 18082,
            publish: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub address: String,
    pub allow_dns_leaks: bool,
    pub tx_proxy: String,
    pub anonymous_inbound: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapSettings {
    pub address: String,
    pub login: String,
    pub proxy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainSettings {
    pub prune: bool,
    pub db_sync_mode: String,
    pub db_salvage: bool,
    pub fast_block_sync: bool,
    pub keep_alt_blocks: bool,
    pub max_txpool_weight: u64,
    pub block_sync_size: u64,
}

impl Default for BlockchainSettings {
    fn default() -> Self {
        Self {
            prune: false,
            db_sync_mode: "fast:async:250000000bytes".into(),
            db_salvage: false,
            fast_block_sync: true,
            keep_alt_blocks: false,
            max_txpool_weight: 648_000_000,
            block_sync_size: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsSettings {
    pub enforce_checkpoints: bool,
    pub disable_checkpoints: bool,
    pub enable_blocklist: bool,
    /// `disabled`, `notify`, `download` or `update`
    pub check_updates: String,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            enforce_checkpoints: false,
            disable_checkpoints: false,
            enable_blocklist: false,
            check_updates: "notify".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatSettings {
    /// `disabled`, `enabled` or `delayed`
    pub igd: String,
}

impl Default for NatSettings {
    fn default() -> Self {
        Self {
            igd: "delayed".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    pub address: String,
    pub threads: u32,
    pub bg_enable: bool,
    pub bg_ignore_battery: bool,
    pub bg_idle_threshold: u32,
    pub bg_miner_target: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Numeric level `0`-`4` or a category list.
    pub level: String,
    pub max_file_size: u64,
    pub max_files: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "0".into(),
            max_file_size: 104_850_000,
            max_files: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub max_concurrency: u32,
    pub prep_blocks_threads: u32,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            prep_blocks_threads: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    pub config_file: String,
    pub data_dir: String,
    pub non_interactive: bool,
    pub extra_messages_file: String,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            config_file: String::new(),
            data_dir: String::new(),
            non_interactive: true,
            extra_messages_file: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Free-form flags appended verbatim, split on whitespace.
    pub extra_flags: String,
}

/// Complete settings snapshot handed to [`to_daemon_args`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub network: NetworkSettings,
    pub p2p: P2pSettings,
    pub bandwidth: BandwidthSettings,
    pub rpc: RpcSettings,
    pub rpcssl: RpcSslSettings,
    #[serde(alias = "zmq")]
    pub messaging: MessagingSettings,
    pub proxy: ProxySettings,
    pub bootstrap: BootstrapSettings,
    pub blockchain: BlockchainSettings,
    pub dns: DnsSettings,
    pub nat: NatSettings,
    pub mining: MiningSettings,
    pub logging: LoggingSettings,
    pub performance: PerformanceSettings,
    pub advanced: AdvancedSettings,
    pub runtime: RuntimeSettings,
}

impl NodeSettings {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| NodeKeeperError::io_with_path(e, path))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Configured data directory, if any.
    pub fn data_dir(&self) -> Option<PathBuf> {
        let dir = self.advanced.data_dir.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }
}
