//! Host checks used before and around starting the daemon.
//!
//! - `storage` - free space on the data directory's disk
//! - `network` - device address discovery

mod network;
mod storage;

pub use network::device_ip;
pub use storage::{check_storage, disk_space_for_path, DiskSpaceInfo, StorageCheck};
