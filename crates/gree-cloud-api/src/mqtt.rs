use async_trait::async_trait;

use crate::auth::Credentials;
use crate::error::Error;

/// A live session with the vendor MQTT broker.
///
/// One session is shared by every device handle of an account; device
/// handles subscribe to their own topics through it when bound.
#[async_trait]
pub trait MqttSession: Send + Sync {
    /// Connect to the broker using the credentials from a cloud login.
    async fn connect(&self, credentials: &Credentials) -> Result<(), Error>;

    /// Close the broker connection.
    async fn disconnect(&self) -> Result<(), Error>;
}
