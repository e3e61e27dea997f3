//! Centralized configuration constants for nodekeeper.
//!
//! User-facing daemon settings live in [`crate::settings`]; this module holds
//! the fixed timeouts, file names and endpoints the core relies on.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "nodekeeper";
    pub const USER_AGENT: &'static str = "nodekeeper/0.3";
    pub const SETTINGS_FILE_NAME: &'static str = "settings.json";
}

/// Timeouts and conventions for the supervised daemon process.
pub struct ProcessConfig;

impl ProcessConfig {
    /// Grace period after the terminate signal before force-killing.
    pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);
    /// Wait after a force kill.
    pub const KILL_TIMEOUT: Duration = Duration::from_secs(2);
    /// Interval at which the monitor thread checks for exit.
    pub const MONITOR_INTERVAL: Duration = Duration::from_millis(100);
    /// Pause before restarting a daemon that exited or failed to start.
    pub const RESTART_BACKOFF: Duration = Duration::from_secs(10);
    /// Bound on `monerod --version`.
    pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);
    /// Bound on `getprop` when asking Android for the CPU ABI.
    pub const GETPROP_TIMEOUT: Duration = Duration::from_secs(5);

    pub const DATA_DIR_FLAG: &'static str = "--data-dir";
    pub const LOG_FILE_FLAG: &'static str = "--log-file";
    pub const LOG_FILE_NAME: &'static str = "monerod.log";

    pub const STDOUT_PREFIX: &'static str = "monerod";
    pub const STDERR_PREFIX: &'static str = "monerod-err";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Fixed timeout for every daemon RPC and DNS-over-HTTPS call.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_RPC_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_RPC_PORT: u16 = 18081;
    /// Target block time used to derive the network hashrate.
    pub const TARGET_BLOCK_TIME_SECS: u64 = 120;
}

/// Remote update feed configuration.
pub struct UpdateConfig;

impl UpdateConfig {
    pub const DNS_RESOLVER_URL: &'static str = "https://dns.google/resolve";
    pub const UPDATE_HOSTNAME: &'static str = "updates.moneropulse.org";
    pub const RECORD_TYPE: &'static str = "TXT";
}

/// Binary and directory names.
pub struct PathsConfig;

impl PathsConfig {
    #[cfg(windows)]
    pub const DESKTOP_BINARY_NAME: &'static str = "monerod.exe";
    #[cfg(not(windows))]
    pub const DESKTOP_BINARY_NAME: &'static str = "monerod";

    /// Name of the staged copy inside the private directory.
    pub const STAGED_BINARY_NAME: &'static str = "monerod";
    pub const STAGED_BIN_DIR_NAME: &'static str = "bin";
    /// Used when the host does not hand us a private directory on Android.
    pub const ANDROID_PRIVATE_FALLBACK: &'static str = "/data/data/org.monerodroid/files";
    pub const ANDROID_LINKER_64: &'static str = "/system/bin/linker64";
    pub const ANDROID_LINKER_32: &'static str = "/system/bin/linker";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_timeouts_are_bounded() {
        assert!(ProcessConfig::KILL_TIMEOUT < ProcessConfig::STOP_TIMEOUT);
        assert!(ProcessConfig::MONITOR_INTERVAL < ProcessConfig::KILL_TIMEOUT);
    }
}
