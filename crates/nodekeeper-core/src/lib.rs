//! NodeKeeper Core - supervision and health reporting for a Monero daemon.
//!
//! This crate finds the right `monerod` build for the host, turns typed
//! settings into its command line, runs it under a small state machine and
//! reports its health over RPC. It has no UI; front ends drive it through
//! [`NodeKeeper`] or use the components directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use nodekeeper_core::{NodeKeeper, NodeSettings};
//!
//! #[tokio::main]
//! async fn main() -> nodekeeper_core::Result<()> {
//!     let mut settings = NodeSettings::default();
//!     settings.advanced.data_dir = "/srv/monero".into();
//!
//!     let keeper = NodeKeeper::builder().settings(settings).build()?;
//!     if keeper.start() {
//!         let stats = keeper.poll().await;
//!         println!("height {} ({:.1}%)", stats.height, stats.sync_progress());
//!         keeper.stop();
//!     }
//!     Ok(())
//! }
//! ```

pub mod arch;
pub mod config;
pub mod error;
pub mod platform;
pub mod process;
pub mod rpc;
pub mod settings;
pub mod status;
pub mod system;
pub mod update;
pub mod version;

mod api;

// Re-export commonly used types
pub use api::NodeKeeperBuilder;
pub use arch::{ArchitectureInfo, ArchitectureResolver, BinaryLocator, CanonicalArch};
pub use error::{NodeKeeperError, Result};
pub use platform::Platform;
pub use process::{
    LineSink, OutputStream, ProcessState, ProcessSupervisor, StateChange, SupervisorConfig,
    SupervisorStatus,
};
pub use settings::{to_daemon_args, NodeSettings};
pub use status::{DaemonVersionInfo, NodeStats, StatusPoller};
pub use system::{check_storage, device_ip, StorageCheck};
pub use update::{UpdateChecker, UpdateStatus};
pub use version::{BinaryVersion, VersionProbe};

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Combined supervisor and binary status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeKeeperStatus {
    pub supervisor: SupervisorStatus,
    pub architecture: ArchitectureInfo,
}

/// One supervised daemon with its pollers.
///
/// Holds a settings snapshot; the supervisor is configured from it at build
/// time and again on [`apply_settings`](Self::apply_settings).
pub struct NodeKeeper {
    platform: Platform,
    settings: NodeSettings,
    resolver: ArchitectureResolver,
    locator: BinaryLocator,
    supervisor: ProcessSupervisor,
    poller: StatusPoller,
    probe: Arc<VersionProbe>,
    updates: UpdateChecker,
}

impl NodeKeeper {
    pub fn builder() -> NodeKeeperBuilder {
        NodeKeeperBuilder::new()
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn version_probe(&self) -> &Arc<VersionProbe> {
        &self.probe
    }

    pub fn update_checker(&self) -> &UpdateChecker {
        &self.updates
    }

    pub fn architecture(&self) -> ArchitectureInfo {
        ArchitectureInfo::collect(&self.resolver, &self.locator)
    }

    /// Arguments the daemon is (or would be) started with.
    pub fn daemon_args(&self) -> Vec<String> {
        to_daemon_args(&self.settings)
    }

    /// Replace the settings snapshot and reconfigure the supervisor.
    ///
    /// The poller follows a changed RPC address. A running daemon keeps
    /// running with its old arguments; stop it first.
    pub fn apply_settings(&mut self, settings: NodeSettings) -> Result<()> {
        if settings.rpc.poll_address() != self.settings.rpc.poll_address() {
            let (host, port) = settings.rpc.poll_address();
            self.poller = StatusPoller::new(&host, port)?;
            info!("Polling daemon RPC at {}", self.poller.base_url());
        }
        self.settings = settings;
        self.configure_supervisor();
        Ok(())
    }

    /// Search for the binary again, e.g. after it was installed.
    pub fn refresh_binary(&mut self) {
        self.locator.refresh();
        self.configure_supervisor();
    }

    fn configure_supervisor(&self) {
        let binary = self.locator.resolve_binary().map(PathBuf::from);
        if self.probe.binary_path() != binary {
            self.probe.set_binary_path(binary.clone());
        }
        self.supervisor
            .configure(SupervisorConfig::new(binary, self.daemon_args()));
    }

    pub fn start(&self) -> bool {
        self.supervisor.start()
    }

    pub fn stop(&self) -> bool {
        self.supervisor.stop()
    }

    pub fn status(&self) -> NodeKeeperStatus {
        NodeKeeperStatus {
            supervisor: self.supervisor.status(),
            architecture: self.architecture(),
        }
    }

    /// Poll the daemon, or report it offline without a request when it is not
    /// running.
    pub async fn poll(&self) -> NodeStats {
        if !self.supervisor.is_running() {
            return NodeStats::default();
        }
        self.poller.poll().await
    }

    /// Look for a daemon already answering on the configured RPC address.
    ///
    /// Polls whatever the supervisor state is, so a node started outside this
    /// process is found before a second one is spawned against the same data
    /// directory.
    pub async fn detect_existing_node(&self) -> Option<NodeStats> {
        if self.supervisor.is_running() {
            return None;
        }
        let stats = self.poller.poll().await;
        if stats.is_offline() {
            return None;
        }
        info!(
            "Found a daemon already running at {} (height {})",
            self.poller.base_url(),
            stats.height
        );
        Some(stats)
    }

    /// Probe the local binary (cached) and compare it with the published
    /// release.
    pub async fn check_for_updates(&self, force: bool) -> UpdateStatus {
        self.probe.get_version(false).await;
        self.updates.check(force).await
    }

    /// Free-space check of the configured data directory, if one is set.
    pub fn storage_check(&self, min_free_gib: f64) -> Option<StorageCheck> {
        self.settings
            .data_dir()
            .map(|dir| check_storage(&dir, min_free_gib))
    }
}

impl std::fmt::Debug for NodeKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKeeper")
            .field("platform", &self.platform)
            .field("supervisor", &self.supervisor)
            .field("poller", &self.poller.base_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_with_data_dir(dir: &std::path::Path) -> NodeSettings {
        let mut settings = NodeSettings::default();
        settings.advanced.data_dir = dir.to_string_lossy().into_owned();
        settings
    }

    #[test]
    fn test_build_without_binary() {
        let temp_dir = TempDir::new().unwrap();
        let keeper = NodeKeeper::builder()
            .platform(Platform::Android)
            .raw_architecture("aarch64")
            .native_lib_dir(temp_dir.path())
            .build()
            .unwrap();

        let status = keeper.status();
        assert_eq!(status.supervisor.state, ProcessState::Stopped);
        assert!(status.architecture.supported);
        assert!(!status.architecture.ready);

        assert!(!keeper.start());
        assert_eq!(
            keeper.supervisor().last_error().as_deref(),
            Some("Configuration missing")
        );
    }

    #[test]
    fn test_build_configures_supervisor() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::File::create(temp_dir.path().join(config::PathsConfig::DESKTOP_BINARY_NAME))
            .unwrap();
        let data_dir = temp_dir.path().join("data");

        let keeper = NodeKeeper::builder()
            .platform(Platform::Desktop)
            .raw_architecture("x86_64")
            .bin_dir(temp_dir.path())
            .settings(settings_with_data_dir(&data_dir))
            .build()
            .unwrap();

        let config = keeper.supervisor().config().unwrap();
        assert!(config.binary_path.is_some());
        assert_eq!(config.args, keeper.daemon_args());
        assert!(config.args.contains(&"--data-dir".to_string()));
        assert!(keeper.version_probe().binary_path().is_some());
    }

    #[test]
    fn test_apply_settings_reconfigures() {
        let temp_dir = TempDir::new().unwrap();
        let mut keeper = NodeKeeper::builder()
            .platform(Platform::Desktop)
            .raw_architecture("x86_64")
            .bin_dir(temp_dir.path())
            .build()
            .unwrap();
        assert_eq!(keeper.daemon_args(), vec!["--non-interactive".to_string()]);

        let mut settings = settings_with_data_dir(temp_dir.path());
        settings.blockchain.prune = true;
        keeper.apply_settings(settings).unwrap();

        let config = keeper.supervisor().config().unwrap();
        assert!(config.args.contains(&"--prune-blockchain".to_string()));
    }

    #[test]
    fn test_apply_settings_moves_poller() {
        let mut keeper = NodeKeeper::builder()
            .platform(Platform::Desktop)
            .raw_architecture("x86_64")
            .build()
            .unwrap();
        assert_eq!(keeper.poller().base_url(), "http://127.0.0.1:18081");

        let mut settings = NodeSettings::default();
        settings.rpc.bind_port = 28081;
        keeper.apply_settings(settings).unwrap();

        assert!(keeper.daemon_args().contains(&"28081".to_string()));
        assert_eq!(keeper.poller().base_url(), "http://127.0.0.1:28081");
    }

    #[test]
    fn test_refresh_binary_finds_new_install() {
        let temp_dir = TempDir::new().unwrap();
        let mut keeper = NodeKeeper::builder()
            .platform(Platform::Android)
            .raw_architecture("armv7l")
            .native_lib_dir(temp_dir.path())
            .build()
            .unwrap();
        assert!(keeper.supervisor().config().unwrap().binary_path.is_none());

        std::fs::File::create(temp_dir.path().join("libmonerod_arm32.so")).unwrap();
        keeper.refresh_binary();

        assert!(keeper.supervisor().config().unwrap().binary_path.is_some());
        assert!(keeper.architecture().ready);
    }

    #[tokio::test]
    async fn test_poll_when_stopped_is_offline() {
        let keeper = NodeKeeper::builder()
            .platform(Platform::Desktop)
            .raw_architecture("x86_64")
            .build()
            .unwrap();

        let stats = keeper.poll().await;
        assert!(stats.is_offline());
        assert!(keeper.poller().last_stats().is_none());
    }

    #[test]
    fn test_storage_check_requires_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let keeper = NodeKeeper::builder()
            .platform(Platform::Desktop)
            .raw_architecture("x86_64")
            .build()
            .unwrap();
        assert!(keeper.storage_check(1.0).is_none());

        let keeper = NodeKeeper::builder()
            .platform(Platform::Desktop)
            .raw_architecture("x86_64")
            .settings(settings_with_data_dir(temp_dir.path()))
            .build()
            .unwrap();
        assert!(keeper.storage_check(0.0).is_some());
    }
}
