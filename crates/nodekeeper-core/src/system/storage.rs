//! Free-space readiness of the blockchain data directory.

use crate::error::{NodeKeeperError, Result};
use serde::Serialize;
use std::path::Path;
use sysinfo::Disks;
use tracing::debug;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Disk usage of the filesystem holding a path.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSpaceInfo {
    pub total: u64,
    pub free: u64,
}

/// Whether a data directory can hold the blockchain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageCheck {
    pub ok: bool,
    pub free_gib: f64,
    pub required_gib: f64,
    /// Why the check failed; `None` when `ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Space on the disk whose mount point is the longest prefix of `path`.
pub fn disk_space_for_path(path: &Path) -> Result<DiskSpaceInfo> {
    let disks = Disks::new_with_refreshed_list();

    let best = disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len());

    match best {
        Some(disk) => {
            debug!(
                "{} is on {} ({} bytes free)",
                path.display(),
                disk.mount_point().display(),
                disk.available_space()
            );
            Ok(DiskSpaceInfo {
                total: disk.total_space(),
                free: disk.available_space(),
            })
        }
        None => Err(NodeKeeperError::Other(format!(
            "Could not determine disk space for {}",
            path.display()
        ))),
    }
}

/// Check that `data_dir` exists and its disk has `min_free_gib` available.
pub fn check_storage(data_dir: &Path, min_free_gib: f64) -> StorageCheck {
    let mut check = StorageCheck {
        ok: false,
        free_gib: 0.0,
        required_gib: min_free_gib,
        reason: None,
    };

    if !data_dir.is_dir() {
        check.reason = Some(format!("{} does not exist", data_dir.display()));
        return check;
    }

    // Mount points are absolute, so compare against the resolved path
    let resolved = data_dir
        .canonicalize()
        .unwrap_or_else(|_| data_dir.to_path_buf());

    match disk_space_for_path(&resolved) {
        Ok(space) => {
            check.free_gib = space.free as f64 / GIB;
            if check.free_gib >= min_free_gib {
                check.ok = true;
            } else {
                check.reason = Some(format!(
                    "Only {:.1} GiB free, {:.1} GiB required",
                    check.free_gib, min_free_gib
                ));
            }
        }
        Err(e) => check.reason = Some(e.to_string()),
    }

    check
}
