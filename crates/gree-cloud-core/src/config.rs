// ── Runtime tuning ──
//
// These values describe *how* a runtime polls and talks to devices.
// Core never reads config files; `gree-cloud-config` builds a
// `RuntimeConfig` and hands it in.

use std::time::Duration;

use gree_cloud_api::CipherVersion;

/// Integration domain, used in coordinator names and registry identifiers.
pub const DOMAIN: &str = "gree_cloud";

/// Consecutive failed refreshes tolerated before a device is unavailable.
pub const MAX_ERRORS: u32 = 3;

/// Default cloud polling interval.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Default timeout applied to every cloud, broker, and device call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for one runtime (one cloud account).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// How often each coordinator refreshes its device.
    pub update_interval: Duration,
    /// Failure threshold for the stale-state fallback.
    pub max_errors: u32,
    /// Upper bound on any single network operation.
    pub request_timeout: Duration,
    /// Cipher used when constructing device handles.
    pub cipher_version: CipherVersion,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            update_interval: UPDATE_INTERVAL,
            max_errors: MAX_ERRORS,
            request_timeout: REQUEST_TIMEOUT,
            cipher_version: CipherVersion::V1,
        }
    }
}
