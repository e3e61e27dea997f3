//! Remote update check against the MoneroPulse DNS TXT records.
//!
//! Records look like `monero:<platform-tag>:<version>:<hash>` and are fetched
//! through Google's DNS-over-HTTPS JSON API. The local version comes from the
//! [`VersionProbe`] cache; the checker never runs the binary itself.

use crate::arch::CanonicalArch;
use crate::config::{AppConfig, NetworkConfig, UpdateConfig};
use crate::error::{NodeKeeperError, Result};
use crate::platform::Platform;
use crate::version::VersionProbe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Outcome of one update check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub local_version: String,
    pub remote_version: String,
    pub remote_hash: String,
    pub update_available: bool,
    /// Empty on success.
    pub error: String,
    pub checked_at: Option<DateTime<Utc>>,
}

impl UpdateStatus {
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// DoH JSON response; only the answers matter.
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(default)]
    data: String,
}

/// Compares the local daemon version with the published one.
#[derive(Debug)]
pub struct UpdateChecker {
    probe: Arc<VersionProbe>,
    platform: Platform,
    arch: CanonicalArch,
    resolver_url: String,
    client: reqwest::Client,
    cached: Mutex<Option<UpdateStatus>>,
}

impl UpdateChecker {
    pub fn new(probe: Arc<VersionProbe>, platform: Platform, arch: CanonicalArch) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(AppConfig::USER_AGENT)
            .build()
            .map_err(|e| NodeKeeperError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            probe,
            platform,
            arch,
            resolver_url: UpdateConfig::DNS_RESOLVER_URL.to_string(),
            client,
            cached: Mutex::new(None),
        })
    }

    /// Use a different DoH endpoint (JSON API compatible with dns.google).
    pub fn with_resolver_url(mut self, url: impl Into<String>) -> Self {
        self.resolver_url = url.into();
        self
    }

    /// TXT record prefix for this platform and architecture.
    pub fn dns_target(&self) -> &'static str {
        match (self.platform, self.arch) {
            (Platform::Android, CanonicalArch::Arm64) => "monero:android-armv8:",
            (Platform::Android, _) => "monero:android-armv7:",
            (Platform::Desktop, _) => "monero:linux-x64:",
        }
    }

    /// Last successful check, if any.
    pub fn cached_status(&self) -> Option<UpdateStatus> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Check for an update. Returns the cached result unless `force`.
    ///
    /// Failures come back as a status with `error` set and are not cached.
    pub async fn check(&self, force: bool) -> UpdateStatus {
        if !force {
            if let Some(status) = self.cached_status() {
                return status;
            }
        }

        let mut status = UpdateStatus {
            checked_at: Some(Utc::now()),
            ..UpdateStatus::default()
        };

        let local = match self.probe.cached_version() {
            Some(local) if !local.version.is_empty() => local,
            _ => {
                status.error = "Local version unavailable".to_string();
                warn!("{}", status.error);
                return status;
            }
        };
        status.local_version = local.version;

        let (remote_version, remote_hash) = match self.fetch_remote_version().await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("Remote version lookup failed: {}", e);
                status.error = "Failed to fetch remote version".to_string();
                return status;
            }
        };
        status.update_available = compare_versions(&status.local_version, &remote_version);
        status.remote_version = remote_version;
        status.remote_hash = remote_hash;

        if status.update_available {
            info!(
                "Update available: {} -> {}",
                status.local_version, status.remote_version
            );
        } else {
            debug!(
                "Up to date: {} >= {}",
                status.local_version, status.remote_version
            );
        }

        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(status.clone());
        status
    }

    async fn fetch_remote_version(&self) -> Result<(String, String)> {
        let response = self
            .client
            .get(&self.resolver_url)
            .query(&[
                ("name", UpdateConfig::UPDATE_HOSTNAME),
                ("type", UpdateConfig::RECORD_TYPE),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NodeKeeperError::Network {
                message: format!("DNS resolver returned HTTP {}", response.status()),
                cause: None,
            });
        }

        let body: DohResponse = response.json().await.map_err(|e| NodeKeeperError::Parse {
            what: "DNS response".into(),
            message: e.to_string(),
        })?;

        select_record(&body.answer, self.dns_target()).ok_or_else(|| NodeKeeperError::Parse {
            what: "DNS TXT records".into(),
            message: format!("no record for {}", self.dns_target()),
        })
    }
}

/// First `monero:<tag>:<version>:<hash>` record matching `target`.
fn select_record(answers: &[DohAnswer], target: &str) -> Option<(String, String)> {
    answers.iter().find_map(|answer| {
        let raw = answer.data.trim_matches('"');
        if !raw.starts_with(target) {
            return None;
        }
        let parts: Vec<&str> = raw.split(':').collect();
        match parts.as_slice() {
            [_, _, version, hash] => Some((version.to_string(), hash.to_string())),
            _ => None,
        }
    })
}

/// `true` when `local` is an older dotted-integer version than `remote`.
///
/// Anything that does not parse as dotted integers compares as "no update".
pub fn compare_versions(local: &str, remote: &str) -> bool {
    fn parse(version: &str) -> Option<Vec<u64>> {
        version.split('.').map(|part| part.parse().ok()).collect()
    }

    match (parse(local), parse(remote)) {
        (Some(local), Some(remote)) => local < remote,
        _ => {
            warn!("Version parse failed: local={}, remote={}", local, remote);
            false
        }
    }
}
