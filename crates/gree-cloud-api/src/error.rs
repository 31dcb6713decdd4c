use thiserror::Error;

/// Top-level error type for the `gree-cloud-api` crate.
///
/// Every collaborator (cloud API, MQTT session, device handle) reports
/// failures through this one type so that `gree-cloud-core` can classify
/// them without knowing which implementation produced them.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, locked account, wrong region).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Network failure talking to the cloud API or the broker.
    #[error("Transport error: {0}")]
    Transport(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Operation did not complete in time.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── MQTT ────────────────────────────────────────────────────────
    /// Broker connection, subscription, or publish failure.
    #[error("MQTT error: {0}")]
    Mqtt(String),

    // ── Device ──────────────────────────────────────────────────────
    /// The device rejected a request or answered with something unusable.
    #[error("Device {mac} error: {message}")]
    Device { mac: String, message: String },

    /// Response payload could not be decoded.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The operation was abandoned because its owner is shutting down.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if this error means the account credentials were
    /// rejected, as opposed to the service being unreachable.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::Transport(message) | Self::Mqtt(message) => mentions_auth(message),
            _ => false,
        }
    }

    /// Returns `true` if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the operation was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport(_) | Self::Mqtt(_)
        ) && !self.is_auth_failure()
    }
}

/// Vendor servers report rejected logins inconsistently; an HTTP 401 or any
/// mention of "auth" in the message is the only reliable indicator.
pub fn mentions_auth(message: &str) -> bool {
    message.contains("401") || message.to_ascii_lowercase().contains("auth")
}
