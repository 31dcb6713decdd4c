// ── Core error types ──
//
// User-facing errors from gree-cloud-core. The `From<gree_cloud_api::Error>`
// impl translates collaborator failures into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Polling ──────────────────────────────────────────────────────
    /// Too many consecutive timeouts; the device is considered offline.
    #[error("Cloud device {device} is unavailable, timeout")]
    Unavailable {
        device: String,
        #[source]
        source: gree_cloud_api::Error,
    },

    /// Too many consecutive non-timeout failures.
    #[error("Cloud device {device} failed to update")]
    UpdateFailed {
        device: String,
        #[source]
        source: gree_cloud_api::Error,
    },

    /// No successful refresh has happened yet, so there is no state to serve.
    #[error("Cloud device {device} has no state yet: {reason}")]
    NotReady { device: String, reason: String },

    /// The operation was abandoned because the runtime is unloading.
    #[error("Operation cancelled")]
    Cancelled,

    // ── Setup ────────────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Cannot connect: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api { message: String },
}

impl CoreError {
    /// Returns `true` if this error marks the device as unavailable to
    /// entities (threshold exceeded or never fetched).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::UpdateFailed { .. } | Self::NotReady { .. }
        )
    }
}

// ── Conversion from collaborator errors ──────────────────────────────

impl From<gree_cloud_api::Error> for CoreError {
    fn from(err: gree_cloud_api::Error) -> Self {
        if err.is_auth_failure() {
            return CoreError::AuthenticationFailed {
                message: err.to_string(),
            };
        }
        match err {
            gree_cloud_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            gree_cloud_api::Error::Cancelled => CoreError::Cancelled,
            gree_cloud_api::Error::Transport(reason) | gree_cloud_api::Error::Mqtt(reason) => {
                CoreError::ConnectionFailed { reason }
            }
            other => CoreError::Api {
                message: other.to_string(),
            },
        }
    }
}
