// ── Entity surface ──
//
// What the home-automation host sees for each coordinator. Only the
// switch platform lives here; climate entities are provided elsewhere.

pub mod switch;

use crate::config::DOMAIN;
use crate::coordinator::DeviceCoordinator;

pub use switch::{GREE_SWITCHES, GreeSwitch, SwitchDescription, SwitchPlatform};

/// Manufacturer reported for every device.
pub const MANUFACTURER: &str = "Gree";

/// Model reported until the device tells us its hid.
pub const UNKNOWN_MODEL: &str = "Unknown Model";

/// Device-registry record shared by every entity of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistryInfo {
    /// `(domain, mac)`.
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceRegistryInfo {
    pub fn from_coordinator(coordinator: &DeviceCoordinator) -> Self {
        let info = coordinator.device_info();
        Self {
            identifiers: (DOMAIN.to_owned(), info.mac.clone()),
            name: info.name.clone(),
            manufacturer: MANUFACTURER.to_owned(),
            model: coordinator
                .model()
                .map_or_else(|| UNKNOWN_MODEL.to_owned(), |hid| hid.as_ref().clone()),
        }
    }
}
