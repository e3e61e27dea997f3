//! Local daemon version detection via `monerod --version`.

use crate::config::ProcessConfig;
use crate::error::{NodeKeeperError, Result};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{LazyLock, Mutex, PoisonError};
use tracing::{error, info, warn};

/// `Monero 'Fluorine Fermi' (v0.18.3.4-release)`
static RELEASE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Monero '([^']+)' \(v([0-9.]+)(-\w+)?\)").expect("release pattern must compile")
});

static BARE_VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v?(\d+\.\d+\.\d+(?:\.\d+)?)").expect("version pattern must compile")
});

/// Parsed `--version` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryVersion {
    /// Dotted version without the leading `v`, e.g. `0.18.3.4`.
    pub version: String,
    pub release_name: String,
    /// Suffix including its dash, e.g. `-release`.
    pub build_tag: String,
    pub is_release: bool,
    pub raw_output: String,
}

impl BinaryVersion {
    /// Parse `--version` output. Unrecognized output gives an empty version.
    pub fn parse(output: &str) -> Self {
        let mut version = Self {
            raw_output: output.to_string(),
            ..Self::default()
        };

        if let Some(caps) = RELEASE_PATTERN.captures(output) {
            version.release_name = caps[1].to_string();
            version.version = caps[2].to_string();
            version.build_tag = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
            version.is_release = version.build_tag.contains("-release");
        } else if let Some(caps) = BARE_VERSION_PATTERN.captures(output) {
            version.version = caps[1].to_string();
        }

        version
    }

    pub fn display_string(&self) -> String {
        if !self.release_name.is_empty() && !self.version.is_empty() {
            format!("'{}' (v{}{})", self.release_name, self.version, self.build_tag)
        } else if !self.version.is_empty() {
            format!("v{}{}", self.version, self.build_tag)
        } else {
            "Unknown".to_string()
        }
    }
}

impl std::fmt::Display for BinaryVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Runs the daemon binary to learn its version. The result is cached.
#[derive(Debug, Default)]
pub struct VersionProbe {
    binary_path: Mutex<Option<PathBuf>>,
    cached: Mutex<Option<BinaryVersion>>,
}

impl VersionProbe {
    pub fn new(binary_path: Option<PathBuf>) -> Self {
        Self {
            binary_path: Mutex::new(binary_path),
            cached: Mutex::new(None),
        }
    }

    /// Point at a different binary. Clears the cached version.
    pub fn set_binary_path(&self, path: Option<PathBuf>) {
        *self
            .binary_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = path;
        self.cached.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn binary_path(&self) -> Option<PathBuf> {
        self.binary_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Last successfully probed version, without running anything.
    pub fn cached_version(&self) -> Option<BinaryVersion> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Version of the configured binary.
    ///
    /// Returns the cached value unless `force_refresh`. A missing binary,
    /// spawn failure, timeout or empty output yields `None`.
    pub async fn get_version(&self, force_refresh: bool) -> Option<BinaryVersion> {
        if !force_refresh {
            if let Some(version) = self.cached_version() {
                return Some(version);
            }
        }

        let path = match self.binary_path() {
            Some(path) if path.exists() => path,
            _ => {
                warn!("Binary path not set or does not exist");
                return None;
            }
        };

        let output = match run_version(&path).await {
            Ok(output) if !output.is_empty() => output,
            Ok(_) => {
                warn!("{} printed no version output", path.display());
                return None;
            }
            Err(e) => {
                error!("Version check failed: {}", e);
                return None;
            }
        };

        let version = BinaryVersion::parse(&output);
        info!("Detected version: {}", version);
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(version.clone());
        Some(version)
    }
}

/// Trimmed stdout of `<binary> --version`, or stderr when stdout is empty.
async fn run_version(path: &Path) -> Result<String> {
    let child = tokio::process::Command::new(path)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| NodeKeeperError::Process {
            message: format!("Failed to run {}: {}", path.display(), e),
        })?;

    let output = tokio::time::timeout(ProcessConfig::VERSION_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| NodeKeeperError::Timeout(ProcessConfig::VERSION_TIMEOUT))?
        .map_err(|e| NodeKeeperError::io_with_path(e, path))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return Ok(stdout);
    }
    Ok(String::from_utf8_lossy(&output.stderr).trim().to_string())
}
