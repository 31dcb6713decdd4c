// ── Switch entities ──
//
// One switch per boolean feature property. Reads come from the
// coordinator's latest snapshot; writes go through update_and_push so
// the edit and the push share the coordinator lock.

use std::collections::HashSet;
use std::sync::Arc;

use gree_cloud_api::props;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::DeviceRegistryInfo;
use crate::coordinator::DeviceCoordinator;
use crate::discovery::DiscoveryEvent;
use crate::runtime::GreeCloudRuntime;

/// Static description of one switchable feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchDescription {
    pub key: &'static str,
    pub translation_key: &'static str,
    /// Vendor property toggled by this switch.
    pub property: &'static str,
    pub enabled_by_default: bool,
}

pub const GREE_SWITCHES: [SwitchDescription; 5] = [
    SwitchDescription {
        key: "Panel Light",
        translation_key: "light",
        property: props::LIGHT,
        enabled_by_default: true,
    },
    SwitchDescription {
        key: "Quiet",
        translation_key: "quiet",
        property: props::QUIET,
        enabled_by_default: true,
    },
    SwitchDescription {
        key: "Fresh Air",
        translation_key: "fresh_air",
        property: props::FRESH_AIR,
        enabled_by_default: true,
    },
    SwitchDescription {
        key: "XFan",
        translation_key: "xfan",
        property: props::XFAN,
        enabled_by_default: true,
    },
    SwitchDescription {
        key: "Health mode",
        translation_key: "health_mode",
        property: props::ANION,
        enabled_by_default: false,
    },
];

// ── GreeSwitch ───────────────────────────────────────────────────

/// A feature switch bound to one coordinator.
#[derive(Debug, Clone)]
pub struct GreeSwitch {
    coordinator: Arc<DeviceCoordinator>,
    description: SwitchDescription,
    unique_id: String,
}

impl GreeSwitch {
    pub fn new(coordinator: Arc<DeviceCoordinator>, description: SwitchDescription) -> Self {
        let unique_id = format!("{}_{}", coordinator.mac(), description.key);
        Self {
            coordinator,
            description,
            unique_id,
        }
    }

    /// All switches for one device.
    pub fn for_coordinator(coordinator: &Arc<DeviceCoordinator>) -> Vec<Self> {
        GREE_SWITCHES
            .iter()
            .map(|d| Self::new(Arc::clone(coordinator), *d))
            .collect()
    }

    /// `{mac}_{key}`.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn description(&self) -> &SwitchDescription {
        &self.description
    }

    pub fn coordinator(&self) -> &Arc<DeviceCoordinator> {
        &self.coordinator
    }

    /// `None` when the device has not reported the property.
    pub fn is_on(&self) -> Option<bool> {
        self.coordinator
            .data()
            .and_then(|snapshot| snapshot.flag(self.description.property))
    }

    pub fn available(&self) -> bool {
        self.coordinator.available()
    }

    pub fn device_info(&self) -> DeviceRegistryInfo {
        DeviceRegistryInfo::from_coordinator(&self.coordinator)
    }

    pub async fn turn_on(&self) {
        self.set(true).await;
    }

    pub async fn turn_off(&self) {
        self.set(false).await;
    }

    async fn set(&self, on: bool) {
        let property = self.description.property;
        debug!(entity = %self.unique_id, on, "setting switch");
        self.coordinator
            .update_and_push(move |device| device.set_property(property, i64::from(on)))
            .await;
    }
}

// ── SwitchPlatform ───────────────────────────────────────────────

/// Registers switches for every coordinator, now and later.
pub struct SwitchPlatform;

impl SwitchPlatform {
    /// Add switches for the runtime's current coordinators, then keep
    /// adding them for devices announced on the discovery channel until
    /// the runtime unloads.
    pub async fn attach<F>(runtime: &GreeCloudRuntime, add_entities: F)
    where
        F: Fn(Vec<GreeSwitch>) + Send + Sync + 'static,
    {
        // Subscribe before reading the list so nothing falls in between.
        let mut events = runtime.subscribe_discovered();
        let cancel = runtime.cancellation();

        let mut known = HashSet::new();
        let mut initial = Vec::new();
        for coordinator in runtime.coordinators().await {
            if known.insert(coordinator.mac().to_owned()) {
                initial.extend(GreeSwitch::for_coordinator(&coordinator));
            }
        }
        info!(count = initial.len(), "adding switch entities");
        if !initial.is_empty() {
            add_entities(initial);
        }

        let listener = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(DiscoveryEvent::DeviceDiscovered(coordinator)) => {
                        if !known.insert(coordinator.mac().to_owned()) {
                            continue;
                        }
                        debug!(coordinator = %coordinator.name(), "adding switches for new device");
                        add_entities(GreeSwitch::for_coordinator(&coordinator));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "switch platform lagged behind discovery");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("switch platform stopped");
        });

        runtime.track_task(listener).await;
    }
}
