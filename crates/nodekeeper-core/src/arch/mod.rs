//! Architecture detection and binary resolution.
//!
//! [`ArchitectureResolver`] turns the host's machine string into a
//! [`CanonicalArch`]; [`BinaryLocator`] uses that to find the matching
//! `monerod` build. Neither ever fails loudly: an unsupported CPU or a missing
//! binary shows up as `supported == false` / `ready == false` in
//! [`ArchitectureInfo`].

mod locator;
mod resolver;

pub use locator::BinaryLocator;
pub use resolver::{ArchitectureResolver, CanonicalArch};

use crate::platform::Platform;
use serde::Serialize;
use std::path::PathBuf;

/// Status summary for UI consumption.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchitectureInfo {
    pub raw: String,
    pub canonical: CanonicalArch,
    pub supported: bool,
    pub binary_path: Option<PathBuf>,
    pub ready: bool,
    pub platform: Platform,
}

impl ArchitectureInfo {
    pub fn collect(resolver: &ArchitectureResolver, locator: &BinaryLocator) -> Self {
        let canonical = resolver.canonical_architecture();
        Self {
            raw: resolver.raw_architecture().to_string(),
            canonical,
            supported: canonical.is_supported(),
            binary_path: locator.resolve_binary().map(PathBuf::from),
            ready: locator.is_ready(),
            platform: resolver.platform(),
        }
    }
}
