// ── Per-device polling coordinator ──
//
// Owns one device handle. Refreshes it on a fixed interval, serves the
// last good snapshot through a bounded run of failures, and forwards
// local edits back to the device. Every operation on the handle runs
// under the coordinator's lock, so refresh and push never interleave.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use gree_cloud_api::{Device, DeviceInfo, Error as ApiError};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::budget::{ErrorBudget, FailureKind, Settled};
use crate::config::{DOMAIN, RuntimeConfig};
use crate::error::CoreError;
use crate::snapshot::StateSnapshot;

// ── UpdateStatus ─────────────────────────────────────────────────

/// Outcome of the most recent refresh, observable by entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    /// `false` once the failure threshold is hit, `true` again on recovery.
    pub last_update_success: bool,
    /// Time of the last refresh that fetched fresh state.
    pub last_update: Option<DateTime<Utc>>,
    /// Current run of consecutive failures.
    pub consecutive_errors: u32,
}

impl Default for UpdateStatus {
    fn default() -> Self {
        Self {
            last_update_success: false,
            last_update: None,
            consecutive_errors: 0,
        }
    }
}

// ── DeviceCoordinator ────────────────────────────────────────────

struct HandleState {
    device: Box<dyn Device>,
    budget: ErrorBudget,
    closed: bool,
}

/// Polling coordinator for a single cloud device.
pub struct DeviceCoordinator {
    name: String,
    info: DeviceInfo,
    update_interval: Duration,
    request_timeout: Duration,
    handle: Mutex<HandleState>,
    data: watch::Sender<Option<StateSnapshot>>,
    status: watch::Sender<UpdateStatus>,
    /// Model identifier, learned from the device on refresh.
    model: ArcSwapOption<String>,
    /// Cancelled on close; aborts in-flight calls and the polling task.
    cancel: CancellationToken,
}

impl DeviceCoordinator {
    /// Wrap a bound device handle. Does NOT refresh -- call
    /// [`first_refresh()`](Self::first_refresh) before exposing it.
    pub fn new(device: Box<dyn Device>, config: &RuntimeConfig, cancel: CancellationToken) -> Self {
        let info = device.device_info().clone();
        let model = device.hid().map(|hid| Arc::new(hid.to_owned()));
        let (data, _) = watch::channel(None);
        let (status, _) = watch::channel(UpdateStatus::default());

        Self {
            name: format!("{DOMAIN}-{}", info.name),
            info,
            update_interval: config.update_interval,
            request_timeout: config.request_timeout,
            handle: Mutex::new(HandleState {
                device,
                budget: ErrorBudget::new(config.max_errors),
                closed: false,
            }),
            data,
            status,
            model: ArcSwapOption::new(model),
            cancel,
        }
    }

    /// Coordinator name, `gree_cloud-{device name}`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn mac(&self) -> &str {
        &self.info.mac
    }

    /// Model identifier reported by the device, if known yet.
    pub fn model(&self) -> Option<Arc<String>> {
        self.model.load_full()
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Latest published snapshot. `None` until the first successful refresh.
    pub fn data(&self) -> Option<StateSnapshot> {
        self.data.borrow().clone()
    }

    /// Subscribe to snapshot changes. Only content changes are published.
    pub fn subscribe(&self) -> watch::Receiver<Option<StateSnapshot>> {
        self.data.subscribe()
    }

    pub fn status(&self) -> UpdateStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<UpdateStatus> {
        self.status.subscribe()
    }

    /// Whether entities backed by this coordinator should be shown as available.
    pub fn available(&self) -> bool {
        self.status.borrow().last_update_success
    }

    /// Current run of consecutive refresh failures.
    pub async fn error_count(&self) -> u32 {
        self.handle.lock().await.budget.consecutive()
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Pull fresh state from the device.
    ///
    /// On success the failure counter resets and the new snapshot is
    /// returned. A failure below the threshold returns the previous
    /// snapshot unchanged. Reaching the threshold fails with
    /// [`CoreError::Unavailable`] for timeouts and
    /// [`CoreError::UpdateFailed`] for anything else. Cancellation returns
    /// [`CoreError::Cancelled`] without touching the counter.
    pub async fn refresh(&self) -> Result<StateSnapshot, CoreError> {
        let mut handle = self.handle.lock().await;
        debug!(
            coordinator = %self.name,
            errors = handle.budget.consecutive(),
            "updating cloud device state"
        );

        let result = guarded(
            &self.cancel,
            self.request_timeout,
            handle.device.update_state(),
        )
        .await;

        let settled = handle.budget.settle(result, classify);
        match settled {
            Settled::Fresh(()) => {
                let snapshot = StateSnapshot::capture(handle.device.raw_properties());
                if let Some(hid) = handle.device.hid() {
                    self.model.store(Some(Arc::new(hid.to_owned())));
                }
                drop(handle);

                self.publish(snapshot.clone());
                self.record(true, 0, true);
                Ok(snapshot)
            }
            Settled::Tolerated {
                kind,
                errors,
                error,
            } => {
                drop(handle);
                if kind == FailureKind::Timeout {
                    warn!(coordinator = %self.name, errors, "timeout updating cloud device, serving last state");
                } else {
                    error!(coordinator = %self.name, errors, error = %error, "error updating cloud device");
                }

                if let Some(previous) = self.data() {
                    self.record(true, errors, false);
                    Ok(previous)
                } else {
                    self.record(false, errors, false);
                    Err(CoreError::NotReady {
                        device: self.name.clone(),
                        reason: error.to_string(),
                    })
                }
            }
            Settled::Exhausted {
                kind,
                errors,
                error,
            } => {
                drop(handle);
                self.record(false, errors, false);
                if kind == FailureKind::Timeout {
                    warn!(coordinator = %self.name, errors, "cloud device unavailable after repeated timeouts");
                    Err(CoreError::Unavailable {
                        device: self.name.clone(),
                        source: error,
                    })
                } else {
                    error!(coordinator = %self.name, errors, error = %error, "cloud device failed to update");
                    Err(CoreError::UpdateFailed {
                        device: self.name.clone(),
                        source: error,
                    })
                }
            }
            Settled::Cancelled(_) => {
                debug!(coordinator = %self.name, "refresh cancelled");
                Err(CoreError::Cancelled)
            }
        }
    }

    /// Initial refresh before the coordinator is handed to entities.
    ///
    /// Succeeds only if fresh state was actually fetched. Tolerated
    /// failures are retried until the error budget is exhausted.
    pub async fn first_refresh(&self) -> Result<StateSnapshot, CoreError> {
        loop {
            match self.refresh().await {
                Ok(snapshot) => {
                    info!(
                        coordinator = %self.name,
                        properties = snapshot.len(),
                        "initial state fetched"
                    );
                    return Ok(snapshot);
                }
                Err(CoreError::NotReady { reason, .. }) => {
                    debug!(coordinator = %self.name, %reason, "retrying initial refresh");
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ── Push ─────────────────────────────────────────────────────

    /// Send the device handle's pending local edits to the network.
    ///
    /// Never fails: timeouts and errors are logged and swallowed. The next
    /// scheduled refresh reconciles the real device state.
    pub async fn push(&self) {
        let mut handle = self.handle.lock().await;
        self.push_locked(&mut handle).await;
    }

    /// Apply a local edit to the device handle, push it, and publish the
    /// edited state so entities reflect the change immediately.
    pub async fn update_and_push<F>(&self, apply: F)
    where
        F: FnOnce(&mut dyn Device) + Send,
    {
        let mut handle = self.handle.lock().await;
        apply(handle.device.as_mut());
        self.push_locked(&mut handle).await;
        let snapshot = StateSnapshot::capture(handle.device.raw_properties());
        drop(handle);
        self.publish(snapshot);
    }

    async fn push_locked(&self, handle: &mut HandleState) {
        let result = guarded(
            &self.cancel,
            self.request_timeout,
            handle.device.push_state_update(),
        )
        .await;

        match result {
            Ok(()) => debug!(coordinator = %self.name, "state update sent"),
            Err(e) if e.is_timeout() => {
                warn!(coordinator = %self.name, "timeout sending state update to cloud device");
            }
            Err(e) if e.is_cancelled() => {
                debug!(coordinator = %self.name, "state update cancelled");
            }
            Err(e) => {
                error!(coordinator = %self.name, error = %e, "error sending state update to cloud device");
            }
        }
    }

    // ── Scheduling ───────────────────────────────────────────────

    /// Spawn the periodic refresh task. Stops when the coordinator is closed.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(poll_task(Arc::clone(self)))
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Stop polling, abort in-flight calls, and close the device handle.
    ///
    /// Idempotent: only the first call reaches the device.
    pub async fn close(&self) -> Result<(), ApiError> {
        self.cancel.cancel();

        let mut handle = self.handle.lock().await;
        if handle.closed {
            return Ok(());
        }
        handle.closed = true;

        match tokio::time::timeout(self.request_timeout, handle.device.close()).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                timeout_secs: self.request_timeout.as_secs(),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Publish a snapshot if its content differs from the current one.
    fn publish(&self, snapshot: StateSnapshot) -> bool {
        self.data.send_if_modified(|current| {
            if current.as_ref() == Some(&snapshot) {
                return false;
            }
            *current = Some(snapshot);
            true
        })
    }

    fn record(&self, success: bool, errors: u32, fresh: bool) {
        self.status.send_if_modified(|status| {
            let before = status.clone();
            status.last_update_success = success;
            status.consecutive_errors = errors;
            if fresh {
                status.last_update = Some(Utc::now());
            }
            *status != before
        });
    }
}

impl fmt::Debug for DeviceCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCoordinator")
            .field("name", &self.name)
            .field("mac", &self.info.mac)
            .field("update_interval", &self.update_interval)
            .finish_non_exhaustive()
    }
}

fn classify(error: &ApiError) -> FailureKind {
    if error.is_cancelled() {
        FailureKind::Cancelled
    } else if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Other
    }
}

/// Run a device call under the request timeout, aborting on cancellation.
async fn guarded<T: Send>(
    cancel: &CancellationToken,
    timeout: Duration,
    call: impl Future<Output = Result<T, ApiError>> + Send,
) -> Result<T, ApiError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ApiError::Cancelled),
        result = tokio::time::timeout(timeout, call) => match result {
            Ok(inner) => inner,
            Err(_) => Err(ApiError::Timeout { timeout_secs: timeout.as_secs() }),
        },
    }
}

/// Periodic refresh loop for one coordinator.
async fn poll_task(coordinator: Arc<DeviceCoordinator>) {
    if coordinator.update_interval.is_zero() {
        debug!(coordinator = %coordinator.name, "polling disabled");
        return;
    }

    let cancel = coordinator.cancel.clone();
    let mut interval = tokio::time::interval(coordinator.update_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match coordinator.refresh().await {
                    Ok(_) => {}
                    Err(CoreError::Cancelled) => break,
                    Err(e) => warn!(coordinator = %coordinator.name, error = %e, "scheduled refresh failed"),
                }
            }
        }
    }

    debug!(coordinator = %coordinator.name, "polling stopped");
}
