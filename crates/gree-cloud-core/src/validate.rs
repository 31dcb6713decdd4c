// ── Credential check ──
//
// Used when a config entry is created: one login attempt against the
// chosen server, classified into the two errors a setup form can show.

use gree_cloud_api::{CloudApi, Error as ApiError, error::mentions_auth};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::REQUEST_TIMEOUT;

/// Why a credential check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginCheckError {
    #[error("invalid username or password")]
    InvalidAuth,

    #[error("cannot connect to Gree cloud")]
    CannotConnect,
}

impl LoginCheckError {
    /// Stable key for form error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidAuth => "invalid_auth",
            Self::CannotConnect => "cannot_connect",
        }
    }
}

/// Log in once, then close the session. Both calls are bounded by
/// [`REQUEST_TIMEOUT`].
///
/// Any error mentioning authentication (or an HTTP 401) counts as bad
/// credentials; everything else, a timeout included, is a connectivity
/// problem.
pub async fn validate_credentials(api: &dyn CloudApi) -> Result<(), LoginCheckError> {
    let result = tokio::time::timeout(REQUEST_TIMEOUT, api.login())
        .await
        .unwrap_or_else(|_| Err(timeout_error()));

    let closed = tokio::time::timeout(REQUEST_TIMEOUT, api.close())
        .await
        .unwrap_or_else(|_| Err(timeout_error()));
    if let Err(e) = closed {
        debug!(error = %e, "error closing API session after credential check");
    }

    match result {
        Ok(credentials) => {
            debug!(user_id = %credentials.user_id, "credentials accepted");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "credential check failed");
            if e.is_auth_failure() || mentions_auth(&e.to_string()) {
                Err(LoginCheckError::InvalidAuth)
            } else {
                Err(LoginCheckError::CannotConnect)
            }
        }
    }
}

fn timeout_error() -> ApiError {
    ApiError::Timeout {
        timeout_secs: REQUEST_TIMEOUT.as_secs(),
    }
}
