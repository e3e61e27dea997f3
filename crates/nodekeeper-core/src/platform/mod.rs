//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks and host queries for OS-specific behavior live here.
//! The rest of the crate never asks "am I on Android?" on its own: a
//! [`Platform`] value is detected once at startup and passed to the
//! components that care.
//!
//! - `permissions` - executable bit handling
//! - `process` - graceful termination signals

pub mod permissions;
pub mod process;

pub use permissions::{ensure_executable, is_executable, set_executable};
pub use process::send_terminate;

use serde::{Deserialize, Serialize};

/// Host capability the supervisor adapts to.
///
/// `Android` covers the sandboxed mobile target: binaries ship as
/// `libmonerod_<arch>.so` in the app's native library directory, must be
/// staged into a private directory and are started through the system
/// dynamic linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Desktop,
    Android,
}

impl Platform {
    /// Detect the platform of the running process.
    pub fn detect() -> Self {
        if cfg!(target_os = "android") || std::env::var_os("ANDROID_ROOT").is_some() {
            Platform::Android
        } else {
            Platform::Desktop
        }
    }

    pub fn is_android(&self) -> bool {
        matches!(self, Platform::Android)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Desktop => "desktop",
            Platform::Android => "android",
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::Desktop
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returns true when pointers are 64 bits wide on this build.
pub fn is_64bit() -> bool {
    cfg!(target_pointer_width = "64")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_matches_environment() {
        let expected = if cfg!(target_os = "android") || std::env::var_os("ANDROID_ROOT").is_some() {
            Platform::Android
        } else {
            Platform::Desktop
        };
        assert_eq!(Platform::detect(), expected);
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::Android).unwrap();
        assert_eq!(json, "\"android\"");
        assert_eq!(Platform::Desktop.to_string(), "desktop");
    }
}
