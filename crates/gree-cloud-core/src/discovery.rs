// ── Cloud device discovery ──
//
// Turns the account's cloud device listing into bound, refreshed
// coordinators. Each device goes through its own pipeline; a failure
// skips that device only.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gree_cloud_api::{
    CipherVersion, CloudApi, CloudDeviceInfo, DeviceFactory, DeviceInfo, Error as ApiError,
    MqttSession,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RuntimeConfig;
use crate::coordinator::DeviceCoordinator;
use crate::error::CoreError;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── DiscoveryEvent ───────────────────────────────────────────────

/// Published on the runtime's discovery channel.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A device finished its pipeline and is ready for entities.
    DeviceDiscovered(Arc<DeviceCoordinator>),
}

/// Create the broadcast channel discovery publishes on.
pub fn discovery_channel() -> broadcast::Sender<DiscoveryEvent> {
    broadcast::channel(EVENT_CHANNEL_SIZE).0
}

// ── DeviceStage ──────────────────────────────────────────────────

/// Progress of one listed device through the discovery pipeline.
///
/// A failure leaves the device at the last stage it reached; it is then
/// skipped. `Active` devices leave only when the runtime unloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStage {
    Listed,
    IdentityBuilt,
    Bound,
    CoordinatorCreated,
    InitialRefreshed,
    Active,
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Listed => "listed",
            Self::IdentityBuilt => "identity built",
            Self::Bound => "bound",
            Self::CoordinatorCreated => "coordinator created",
            Self::InitialRefreshed => "initial refresh done",
            Self::Active => "active",
        };
        f.write_str(s)
    }
}

/// Why a device was skipped.
#[derive(Debug)]
struct SkippedDevice {
    stage: DeviceStage,
    error: CoreError,
}

impl SkippedDevice {
    fn at(stage: DeviceStage, error: impl Into<CoreError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

// ── DiscoveryService ─────────────────────────────────────────────

/// Discovers every cloud device on one account.
pub struct DiscoveryService {
    api: Arc<dyn CloudApi>,
    factory: Arc<dyn DeviceFactory>,
    config: RuntimeConfig,
    events: broadcast::Sender<DiscoveryEvent>,
    cancel: CancellationToken,
}

impl DiscoveryService {
    /// `cancel` is the parent of every coordinator's token.
    pub fn new(
        api: Arc<dyn CloudApi>,
        factory: Arc<dyn DeviceFactory>,
        config: RuntimeConfig,
        events: broadcast::Sender<DiscoveryEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            factory,
            config,
            events,
            cancel,
        }
    }

    /// Discover all cloud devices.
    ///
    /// Returns a coordinator for every device whose pipeline completed.
    /// A failing listing call returns an empty set.
    pub async fn discover_devices(
        &self,
        mqtt: &Arc<dyn MqttSession>,
    ) -> Vec<Arc<DeviceCoordinator>> {
        self.discover_new_devices(mqtt, &HashSet::new()).await
    }

    /// Like [`discover_devices`](Self::discover_devices), but skips devices
    /// whose MAC is in `known`.
    pub async fn discover_new_devices(
        &self,
        mqtt: &Arc<dyn MqttSession>,
        known: &HashSet<String>,
    ) -> Vec<Arc<DeviceCoordinator>> {
        debug!("fetching devices from Gree cloud");
        let listed = match self.list_devices().await {
            Ok(listed) => listed,
            Err(e) => {
                error!(error = %e, "failed to discover cloud devices");
                return Vec::new();
            }
        };
        info!(count = listed.len(), "found cloud devices");

        let mut coordinators = Vec::new();
        for record in listed {
            if known.contains(&record.mac) {
                debug!(mac = %record.mac, "device already set up");
                continue;
            }

            let name = record.name.clone();
            match self.setup_device(mqtt, record).await {
                Ok(coordinator) => {
                    // No receivers is fine: platforms attach after the
                    // initial batch and read the coordinator list instead.
                    let _ = self
                        .events
                        .send(DiscoveryEvent::DeviceDiscovered(Arc::clone(&coordinator)));
                    debug!(coordinator = %coordinator.name(), stage = %DeviceStage::Active, "device discovered");
                    coordinators.push(coordinator);
                }
                Err(skipped) => {
                    error!(
                        device = %name,
                        stage = %skipped.stage,
                        error = %skipped.error,
                        "failed to set up cloud device"
                    );
                }
            }
        }

        coordinators
    }

    async fn list_devices(&self) -> Result<Vec<CloudDeviceInfo>, CoreError> {
        let timeout = self.config.request_timeout;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CoreError::Cancelled),
            result = tokio::time::timeout(timeout, self.api.get_all_devices()) => match result {
                Ok(listed) => Ok(listed?),
                Err(_) => Err(timeout_error(timeout).into()),
            },
        }
    }

    /// Run one listed device through the pipeline.
    async fn setup_device(
        &self,
        mqtt: &Arc<dyn MqttSession>,
        record: CloudDeviceInfo,
    ) -> Result<Arc<DeviceCoordinator>, SkippedDevice> {
        let mut stage = DeviceStage::Listed;

        let CloudDeviceInfo { mac, name, key } = record;
        let info = DeviceInfo::cloud(mac, name);
        stage = advance(stage, DeviceStage::IdentityBuilt);

        let mut device = self
            .factory
            .create(Arc::clone(mqtt), info, key, self.cipher())
            .map_err(|e| SkippedDevice::at(stage, e))?;

        let timeout = self.config.request_timeout;
        let bound = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ApiError::Cancelled),
            result = tokio::time::timeout(timeout, device.bind()) => {
                result.unwrap_or_else(|_| Err(timeout_error(timeout)))
            }
        };
        if let Err(e) = bound {
            // The handle may already hold a subscription.
            if let Err(close_err) = device.close().await {
                debug!(error = %close_err, "error releasing device handle");
            }
            return Err(SkippedDevice::at(stage, e));
        }
        debug!(
            device = %device.device_info().name,
            mac = %device.device_info().mac,
            "bound to cloud device"
        );
        stage = advance(stage, DeviceStage::Bound);

        let coordinator = Arc::new(DeviceCoordinator::new(
            device,
            &self.config,
            self.cancel.child_token(),
        ));
        stage = advance(stage, DeviceStage::CoordinatorCreated);

        if let Err(e) = coordinator.first_refresh().await {
            if let Err(close_err) = coordinator.close().await {
                debug!(coordinator = %coordinator.name(), error = %close_err, "error closing device");
            }
            return Err(SkippedDevice::at(stage, e));
        }
        advance(stage, DeviceStage::InitialRefreshed);

        Ok(coordinator)
    }

    fn cipher(&self) -> CipherVersion {
        self.config.cipher_version
    }
}

fn advance(from: DeviceStage, to: DeviceStage) -> DeviceStage {
    debug!(from = %from, to = %to, "device stage");
    to
}

fn timeout_error(timeout: Duration) -> ApiError {
    ApiError::Timeout {
        timeout_secs: timeout.as_secs(),
    }
}
