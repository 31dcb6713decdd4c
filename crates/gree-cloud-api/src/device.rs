// Device handle contract
//
// A device handle is the vendor SDK's stateful view of one physical unit:
// a cached property map refreshed from the broker, plus local edits that
// are sent back on push.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::mqtt::MqttSession;

/// Raw device properties keyed by vendor property name (`"Pow"`, `"Lig"`, ...).
pub type RawProperties = BTreeMap<String, i64>;

/// Vendor property names used by this workspace.
pub mod props {
    pub const POWER: &str = "Pow";
    pub const LIGHT: &str = "Lig";
    pub const QUIET: &str = "Quiet";
    pub const FRESH_AIR: &str = "Air";
    pub const XFAN: &str = "Blo";
    pub const ANION: &str = "Health";
}

// ── DeviceInfo ──────────────────────────────────────────────────────

/// Identity descriptor of a device.
///
/// Cloud devices are reached through the broker, never directly, so
/// `ip` and `port` carry unused sentinel values for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub ip: IpAddr,
    pub port: u16,
    pub mac: String,
    pub name: String,
}

impl DeviceInfo {
    /// Descriptor for a cloud-only device.
    pub fn cloud(mac: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            mac: mac.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mac)
    }
}

// ── CipherVersion ───────────────────────────────────────────────────

/// Encryption scheme used for device payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherVersion {
    #[default]
    V1,
    V2,
}

impl CipherVersion {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }
}

impl TryFrom<u8> for CipherVersion {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(other),
        }
    }
}

// ── Device ──────────────────────────────────────────────────────────

/// A stateful handle to one physical unit.
///
/// Handles are not internally synchronized; the owner must serialize
/// calls (every mutating method takes `&mut self`).
#[async_trait]
pub trait Device: Send + Sync {
    /// Identity descriptor the handle was built with.
    fn device_info(&self) -> &DeviceInfo;

    /// Model identifier, known once the device has reported in.
    fn hid(&self) -> Option<&str>;

    /// The cached property map, including unsent local edits.
    fn raw_properties(&self) -> &RawProperties;

    /// Change a property locally. Sent on the next
    /// [`push_state_update`](Self::push_state_update).
    fn set_property(&mut self, name: &str, value: i64);

    /// Subscribe to the device's state topics on the shared broker session.
    async fn bind(&mut self) -> Result<(), Error>;

    /// Refresh the cached property map from the network.
    async fn update_state(&mut self) -> Result<(), Error>;

    /// Send pending local edits to the network.
    async fn push_state_update(&mut self) -> Result<(), Error>;

    /// Unsubscribe and release resources.
    async fn close(&mut self) -> Result<(), Error>;
}

/// Builds device handles for cloud-listed devices.
pub trait DeviceFactory: Send + Sync {
    fn create(
        &self,
        mqtt: Arc<dyn MqttSession>,
        info: DeviceInfo,
        key: SecretString,
        cipher: CipherVersion,
    ) -> Result<Box<dyn Device>, Error>;
}
