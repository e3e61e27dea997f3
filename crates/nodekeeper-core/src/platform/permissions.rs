//! Platform-specific file permission handling.

use crate::error::{NodeKeeperError, Result};
use std::path::Path;
use tracing::debug;

/// Make a file executable.
///
/// # Platform Behavior
/// - **Linux/macOS/Android**: Sets mode 0o755
/// - **Windows**: No-op (executability is determined by extension)
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata =
            std::fs::metadata(path).map_err(|e| NodeKeeperError::io_with_path(e, path))?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| NodeKeeperError::io_with_path(e, path))?;
        debug!("Set executable permissions on: {}", path.display());
    }

    #[cfg(windows)]
    {
        debug!("Skipping executable bit on Windows for: {}", path.display());
    }

    Ok(())
}

/// Check if a file has executable permissions.
///
/// # Platform Behavior
/// - **Unix**: any execute bit set
/// - **Windows**: `.exe`, `.bat`, `.cmd` or `.com` extension
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(path) {
            Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
            Err(_) => false,
        }
    }

    #[cfg(windows)]
    {
        path.is_file()
            && path
                .extension()
                .map(|ext| {
                    matches!(
                        ext.to_string_lossy().to_lowercase().as_str(),
                        "exe" | "bat" | "cmd" | "com"
                    )
                })
                .unwrap_or(false)
    }
}

/// Make `path` executable unless it already is. Failures are logged, not
/// returned: a binary we cannot chmod may still be runnable.
pub fn ensure_executable(path: &Path) {
    if is_executable(path) {
        return;
    }
    if let Err(e) = set_executable(path) {
        tracing::warn!("Could not chmod {}: {}", path.display(), e);
    }
}
