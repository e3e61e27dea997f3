//! Host CPU architecture detection and normalization.

use crate::config::ProcessConfig;
use crate::platform::{self, Platform};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Canonical architecture identifier used to pick a binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalArch {
    Arm32,
    Arm64,
    Amd64,
    Unsupported,
}

/// Exact matches, checked before the substring heuristics.
const ARCH_TABLE: &[(&str, CanonicalArch)] = &[
    ("armv7l", CanonicalArch::Arm32),
    ("armv7", CanonicalArch::Arm32),
    ("armv8l", CanonicalArch::Arm32),
    ("armeabi-v7a", CanonicalArch::Arm32),
    ("armeabi", CanonicalArch::Arm32),
    ("aarch64", CanonicalArch::Arm64),
    ("arm64", CanonicalArch::Arm64),
    ("arm64-v8a", CanonicalArch::Arm64),
    ("x86_64", CanonicalArch::Amd64),
    ("amd64", CanonicalArch::Amd64),
    ("x64", CanonicalArch::Amd64),
];

impl CanonicalArch {
    /// Normalize a raw machine string.
    pub fn from_raw(raw: &str) -> Self {
        let raw = raw.trim().to_lowercase();

        if let Some((_, arch)) = ARCH_TABLE.iter().find(|(name, _)| *name == raw) {
            return *arch;
        }

        if raw.contains("arm64") || raw.contains("aarch64") {
            CanonicalArch::Arm64
        } else if raw.contains("arm") {
            CanonicalArch::Arm32
        } else if raw.contains("x86_64") || raw.contains("amd64") {
            CanonicalArch::Amd64
        } else {
            CanonicalArch::Unsupported
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalArch::Arm32 => "arm32",
            CanonicalArch::Arm64 => "arm64",
            CanonicalArch::Amd64 => "amd64",
            CanonicalArch::Unsupported => "unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, CanonicalArch::Unsupported)
    }
}

impl std::fmt::Display for CanonicalArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detects the host architecture once and caches the result.
#[derive(Debug)]
pub struct ArchitectureResolver {
    platform: Platform,
    /// Raw string supplied by the caller instead of querying the host.
    raw_override: Option<String>,
    raw: OnceLock<String>,
    canonical: OnceLock<CanonicalArch>,
}

impl ArchitectureResolver {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            raw_override: None,
            raw: OnceLock::new(),
            canonical: OnceLock::new(),
        }
    }

    /// Use a known machine string instead of querying the host.
    pub fn with_raw(platform: Platform, raw: impl Into<String>) -> Self {
        Self {
            raw_override: Some(raw.into()),
            ..Self::new(platform)
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Raw machine-type string of the host.
    ///
    /// On Android an empty or `unknown` answer from the kernel falls back to
    /// the `ro.product.cpu.abi` property, then to pointer width.
    pub fn raw_architecture(&self) -> &str {
        self.raw.get_or_init(|| {
            let mut raw = match &self.raw_override {
                Some(raw) => raw.clone(),
                None => host_machine(),
            };

            if self.platform.is_android() && (raw.is_empty() || raw == "unknown") {
                raw = android_abi().unwrap_or_else(|| {
                    if platform::is_64bit() {
                        "arm64".to_string()
                    } else {
                        "arm32".to_string()
                    }
                });
            }

            if raw.is_empty() {
                "unknown".to_string()
            } else {
                raw
            }
        })
    }

    /// Normalized architecture identifier.
    pub fn canonical_architecture(&self) -> CanonicalArch {
        *self.canonical.get_or_init(|| {
            let raw = self.raw_architecture();
            let arch = CanonicalArch::from_raw(raw);
            info!("Detected architecture: {} -> {}", raw, arch);
            arch
        })
    }

    pub fn is_supported(&self) -> bool {
        self.canonical_architecture().is_supported()
    }

    /// Forget cached values so the next query re-detects.
    pub fn refresh(&mut self) {
        self.raw.take();
        self.canonical.take();
    }
}

#[cfg(unix)]
fn host_machine() -> String {
    match nix::sys::utsname::uname() {
        Ok(uts) => uts.machine().to_string_lossy().into_owned(),
        Err(e) => {
            debug!("uname failed: {}", e);
            String::new()
        }
    }
}

#[cfg(not(unix))]
fn host_machine() -> String {
    std::env::consts::ARCH.to_string()
}

/// Ask the Android property system for the primary CPU ABI.
fn android_abi() -> Option<String> {
    let mut child = Command::new("getprop")
        .arg("ro.product.cpu.abi")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| debug!("getprop failed: {}", e))
        .ok()?;

    let deadline = Instant::now() + ProcessConfig::GETPROP_TIMEOUT;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(None) => {
                debug!("getprop timed out");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Err(e) => {
                debug!("getprop wait failed: {}", e);
                return None;
            }
        }
    }

    let output = child.wait_with_output().ok()?;
    let abi = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!abi.is_empty()).then_some(abi)
}
