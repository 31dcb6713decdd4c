// ── Runtime context ──
//
// Full lifecycle for one cloud account: login, broker session,
// discovery, per-device polling, and ordered teardown. One runtime per
// config entry; nothing here is process-global.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gree_cloud_api::{CloudApi, DeviceFactory, Error as ApiError, MqttSession};
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::coordinator::DeviceCoordinator;
use crate::discovery::{DiscoveryEvent, DiscoveryService, discovery_channel};
use crate::error::CoreError;

// ── RuntimeState ─────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Loaded,
    Unloading,
    Unloaded,
}

// ── GreeCloudRuntime ─────────────────────────────────────────────

/// Everything a loaded config entry owns.
///
/// Cheaply cloneable via `Arc<RuntimeInner>`. Created by
/// [`setup()`](Self::setup), torn down by [`unload()`](Self::unload).
#[derive(Clone)]
pub struct GreeCloudRuntime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    cloud_api: Arc<dyn CloudApi>,
    mqtt: Arc<dyn MqttSession>,
    discovery: DiscoveryService,
    /// Appended by discovery only; entities read it.
    coordinators: RwLock<Vec<Arc<DeviceCoordinator>>>,
    events: broadcast::Sender<DiscoveryEvent>,
    /// Parent of every coordinator and platform token.
    cancel: CancellationToken,
    /// Polling tasks and platform listeners.
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    state: watch::Sender<RuntimeState>,
}

impl GreeCloudRuntime {
    /// Set up a runtime: log in, connect the broker, discover devices,
    /// and start polling them.
    ///
    /// On failure everything created so far is torn down before the
    /// error is returned.
    pub async fn setup(
        config: RuntimeConfig,
        cloud_api: Arc<dyn CloudApi>,
        mqtt: Arc<dyn MqttSession>,
        factory: Arc<dyn DeviceFactory>,
    ) -> Result<Self, CoreError> {
        info!("setting up Gree cloud runtime");

        debug!("logging in to Gree cloud");
        let timeout = config.request_timeout;
        let credentials = match bounded(timeout, cloud_api.login()).await {
            Ok(credentials) => credentials,
            Err(e) => {
                close_cloud(cloud_api.as_ref(), timeout).await;
                return Err(e.into());
            }
        };

        debug!(user_id = %credentials.user_id, "connecting to Gree MQTT broker");
        if let Err(e) = bounded(timeout, mqtt.connect(&credentials)).await {
            close_cloud(cloud_api.as_ref(), timeout).await;
            return Err(e.into());
        }

        let cancel = CancellationToken::new();
        let events = discovery_channel();
        let discovery = DiscoveryService::new(
            Arc::clone(&cloud_api),
            factory,
            config.clone(),
            events.clone(),
            cancel.clone(),
        );
        let (state, _) = watch::channel(RuntimeState::Loaded);

        let runtime = Self {
            inner: Arc::new(RuntimeInner {
                config,
                cloud_api,
                mqtt,
                discovery,
                coordinators: RwLock::new(Vec::new()),
                events,
                cancel,
                task_handles: Mutex::new(Vec::new()),
                state,
            }),
        };

        let found = runtime.inner.discovery.discover_devices(&runtime.inner.mqtt).await;
        info!(count = found.len(), "discovered cloud devices");
        runtime.adopt(found).await;

        Ok(runtime)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Snapshot of the current coordinator list.
    pub async fn coordinators(&self) -> Vec<Arc<DeviceCoordinator>> {
        self.inner.coordinators.read().await.clone()
    }

    /// Look up a coordinator by device MAC.
    pub async fn coordinator(&self, mac: &str) -> Option<Arc<DeviceCoordinator>> {
        self.inner
            .coordinators
            .read()
            .await
            .iter()
            .find(|c| c.mac() == mac)
            .cloned()
    }

    /// Subscribe to devices found by later discovery runs.
    pub fn subscribe_discovered(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.inner.events.subscribe()
    }

    pub fn state(&self) -> RuntimeState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RuntimeState> {
        self.inner.state.subscribe()
    }

    /// Token cancelled when the runtime starts unloading.
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Run discovery again and start polling devices not seen before.
    ///
    /// New devices are announced on the discovery channel. Returns the
    /// newly added coordinators.
    pub async fn rediscover(&self) -> Result<Vec<Arc<DeviceCoordinator>>, CoreError> {
        if self.state() != RuntimeState::Loaded {
            return Err(CoreError::Cancelled);
        }

        let known: HashSet<String> = self
            .inner
            .coordinators
            .read()
            .await
            .iter()
            .map(|c| c.mac().to_owned())
            .collect();

        let found = self
            .inner
            .discovery
            .discover_new_devices(&self.inner.mqtt, &known)
            .await;
        info!(count = found.len(), "discovered new cloud devices");
        if self.adopt(found.clone()).await {
            Ok(found)
        } else {
            Err(CoreError::Cancelled)
        }
    }

    /// Register a background task to be stopped on unload.
    pub async fn track_task(&self, handle: JoinHandle<()>) {
        self.inner.task_handles.lock().await.push(handle);
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Tear everything down in reverse order of setup: platform and
    /// polling tasks, device handles, the broker session, the cloud
    /// session. Each step is best-effort; failures are logged and the
    /// next step still runs. Calling it again is a no-op.
    pub async fn unload(&self) {
        let started = self.inner.state.send_if_modified(|state| {
            if *state == RuntimeState::Loaded {
                *state = RuntimeState::Unloading;
                true
            } else {
                false
            }
        });
        if !started {
            debug!("runtime already unloading");
            return;
        }
        info!("unloading Gree cloud runtime");

        // Platforms and polling
        self.inner.cancel.cancel();
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            match handle.await {
                Err(e) if e.is_panic() => warn!(error = %e, "background task panicked"),
                _ => {}
            }
        }

        // Devices
        let coordinators = self.coordinators().await;
        let closes = coordinators.iter().map(|c| async move {
            if let Err(e) = c.close().await {
                warn!(coordinator = %c.name(), error = %e, "error closing device");
            }
        });
        futures_util::future::join_all(closes).await;

        // Broker
        let timeout = self.inner.config.request_timeout;
        if let Err(e) = bounded(timeout, self.inner.mqtt.disconnect()).await {
            warn!(error = %e, "error disconnecting MQTT client");
        }

        // Cloud
        close_cloud(self.inner.cloud_api.as_ref(), timeout).await;

        self.inner.state.send_replace(RuntimeState::Unloaded);
        info!("Gree cloud runtime unloaded");
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Append newly set-up coordinators and start polling them.
    ///
    /// Once unload has begun the coordinators are closed instead; unload
    /// reads the list under the same lock, so nothing slips past it.
    /// Returns whether they were adopted.
    async fn adopt(&self, found: Vec<Arc<DeviceCoordinator>>) -> bool {
        let mut coordinators = self.inner.coordinators.write().await;
        if self.inner.cancel.is_cancelled() {
            drop(coordinators);
            debug!(count = found.len(), "runtime unloading, releasing new devices");
            for coordinator in found {
                if let Err(e) = coordinator.close().await {
                    debug!(coordinator = %coordinator.name(), error = %e, "error closing device");
                }
            }
            return false;
        }

        let mut handles = Vec::with_capacity(found.len());
        for coordinator in found {
            handles.push(coordinator.spawn_polling());
            coordinators.push(coordinator);
        }
        drop(coordinators);
        self.inner.task_handles.lock().await.extend(handles);
        true
    }
}

/// Run a session call under the request timeout.
async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| {
            Err(ApiError::Timeout {
                timeout_secs: timeout.as_secs(),
            })
        })
}

async fn close_cloud(api: &dyn CloudApi, timeout: Duration) {
    if let Err(e) = bounded(timeout, api.close()).await {
        warn!(error = %e, "error closing API session");
    }
}
