//! Locating the platform-appropriate daemon binary.

use super::resolver::CanonicalArch;
use crate::config::PathsConfig;
use crate::platform::{self, Platform};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{error, info};

/// Finds the daemon executable for the detected architecture.
///
/// Android packages ship `libmonerod_<arch>.so` inside the app's native
/// library directory. Desktop bundles ship a plain `monerod` next to (or one
/// level above) the running executable, or in an explicitly configured bin
/// directory.
#[derive(Debug)]
pub struct BinaryLocator {
    platform: Platform,
    arch: CanonicalArch,
    bin_dir: Option<PathBuf>,
    native_lib_dir: Option<PathBuf>,
    resolved: OnceLock<Option<PathBuf>>,
}

impl BinaryLocator {
    pub fn new(platform: Platform, arch: CanonicalArch) -> Self {
        Self {
            platform,
            arch,
            bin_dir: None,
            native_lib_dir: None,
            resolved: OnceLock::new(),
        }
    }

    /// Search this directory first on desktop.
    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dir = Some(dir.into());
        self
    }

    /// Native library directory handed to us by the Android host app.
    pub fn with_native_lib_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.native_lib_dir = Some(dir.into());
        self
    }

    /// File name the binary is expected to have on this platform.
    pub fn binary_name(&self) -> String {
        match self.platform {
            Platform::Android => format!("libmonerod_{}.so", self.arch),
            Platform::Desktop => PathsConfig::DESKTOP_BINARY_NAME.to_string(),
        }
    }

    /// Candidate paths, in search order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let name = self.binary_name();
        let dirs: Vec<PathBuf> = match self.platform {
            Platform::Android => self.native_lib_dir.iter().cloned().collect(),
            Platform::Desktop => {
                let mut dirs: Vec<PathBuf> = self
                    .bin_dir
                    .iter()
                    .filter(|dir| dir.is_dir())
                    .cloned()
                    .collect();
                if let Some(exe_dir) = std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
                {
                    let parent = exe_dir.parent().map(Path::to_path_buf);
                    dirs.push(exe_dir);
                    dirs.extend(parent);
                }
                dirs
            }
        };

        dirs.into_iter().map(|dir| dir.join(&name)).collect()
    }

    /// First existing candidate, with its execute bit fixed if needed.
    ///
    /// The result is cached until [`refresh`](Self::refresh).
    pub fn resolve_binary(&self) -> Option<&Path> {
        self.resolved
            .get_or_init(|| {
                if !self.arch.is_supported() {
                    error!("No binary for unsupported architecture");
                    return None;
                }

                let found = self.candidates().into_iter().find(|path| path.is_file());
                match &found {
                    Some(path) => {
                        platform::ensure_executable(path);
                        info!("Found {} binary: {}", self.platform, path.display());
                    }
                    None => error!("{} binary not found: {}", self.platform, self.binary_name()),
                }
                found
            })
            .as_deref()
    }

    /// Binary resolved, present on disk and executable.
    pub fn is_ready(&self) -> bool {
        self.resolve_binary()
            .map(|path| path.exists() && platform::is_executable(path))
            .unwrap_or(false)
    }

    pub fn refresh(&mut self) {
        self.resolved.take();
    }
}
