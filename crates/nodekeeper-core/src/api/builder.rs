//! Builder for configuring NodeKeeper initialization.

use std::path::PathBuf;
use std::sync::Arc;

use crate::arch::{ArchitectureResolver, BinaryLocator};
use crate::error::Result;
use crate::platform::Platform;
use crate::process::{LineSink, ProcessSupervisor};
use crate::settings::NodeSettings;
use crate::status::StatusPoller;
use crate::update::UpdateChecker;
use crate::version::VersionProbe;
use crate::NodeKeeper;

/// Builder for configuring NodeKeeper initialization.
///
/// # Example
///
/// ```rust,ignore
/// use nodekeeper_core::NodeKeeper;
///
/// let keeper = NodeKeeper::builder()
///     .settings(settings)
///     .bin_dir("/opt/monero")
///     .build()?;
/// ```
#[derive(Default)]
pub struct NodeKeeperBuilder {
    platform: Option<Platform>,
    raw_arch: Option<String>,
    settings: NodeSettings,
    bin_dir: Option<PathBuf>,
    native_lib_dir: Option<PathBuf>,
    private_dir: Option<PathBuf>,
    line_sink: Option<Arc<dyn LineSink>>,
    resolver_url: Option<String>,
}

impl NodeKeeperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override platform detection.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Use a known machine string instead of querying the host.
    pub fn raw_architecture(mut self, raw: impl Into<String>) -> Self {
        self.raw_arch = Some(raw.into());
        self
    }

    pub fn settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Desktop directory searched first for `monerod`.
    pub fn bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(dir.into());
        self
    }

    /// Android native library directory holding `libmonerod_<arch>.so`.
    pub fn native_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.native_lib_dir = Some(dir.into());
        self
    }

    /// Writable app-private directory the binary is staged into on Android.
    pub fn private_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.private_dir = Some(dir.into());
        self
    }

    pub fn line_sink(mut self, sink: Arc<dyn LineSink>) -> Self {
        self.line_sink = Some(sink);
        self
    }

    /// DNS-over-HTTPS endpoint used by the update checker.
    pub fn resolver_url(mut self, url: impl Into<String>) -> Self {
        self.resolver_url = Some(url.into());
        self
    }

    /// Wire the components together and configure the supervisor.
    pub fn build(self) -> Result<NodeKeeper> {
        let platform = self.platform.unwrap_or_else(Platform::detect);

        let resolver = match self.raw_arch {
            Some(raw) => ArchitectureResolver::with_raw(platform, raw),
            None => ArchitectureResolver::new(platform),
        };

        let mut locator = BinaryLocator::new(platform, resolver.canonical_architecture());
        if let Some(dir) = self.bin_dir {
            locator = locator.with_bin_dir(dir);
        }
        if let Some(dir) = self.native_lib_dir {
            locator = locator.with_native_lib_dir(dir);
        }

        let mut supervisor = ProcessSupervisor::new(platform);
        if let Some(dir) = self.private_dir {
            supervisor = supervisor.with_private_dir(dir);
        }
        if let Some(sink) = self.line_sink {
            supervisor = supervisor.with_line_sink(sink);
        }

        let (host, port) = self.settings.rpc.poll_address();
        let poller = StatusPoller::new(&host, port)?;

        let probe = Arc::new(VersionProbe::new(locator.resolve_binary().map(PathBuf::from)));

        let mut updates =
            UpdateChecker::new(probe.clone(), platform, resolver.canonical_architecture())?;
        if let Some(url) = self.resolver_url {
            updates = updates.with_resolver_url(url);
        }

        let keeper = NodeKeeper {
            platform,
            settings: self.settings,
            resolver,
            locator,
            supervisor,
            poller,
            probe,
            updates,
        };
        keeper.configure_supervisor();
        Ok(keeper)
    }
}
