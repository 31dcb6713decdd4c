// Cloud API contract
//
// The vendor cloud owns account login and the per-account device
// registry. Implementations wrap whatever HTTP protocol the region
// speaks; callers only see these three calls.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::auth::Credentials;
use crate::error::Error;

/// One device as listed by the cloud registry.
///
/// Read-only, consumed once to construct a device handle.
#[derive(Debug, Clone)]
pub struct CloudDeviceInfo {
    /// Hardware address, the stable identity of the unit.
    pub mac: String,
    /// Display name chosen in the vendor app.
    pub name: String,
    /// Per-device encryption key.
    pub key: SecretString,
}

impl CloudDeviceInfo {
    pub fn new(mac: impl Into<String>, name: impl Into<String>, key: SecretString) -> Self {
        Self {
            mac: mac.into(),
            name: name.into(),
            key,
        }
    }
}

/// Authenticated access to the vendor cloud for one account.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Log in with the account credentials the client was built with.
    async fn login(&self) -> Result<Credentials, Error>;

    /// List every device registered to the account.
    async fn get_all_devices(&self) -> Result<Vec<CloudDeviceInfo>, Error>;

    /// Release the HTTP session.
    async fn close(&self) -> Result<(), Error>;
}
