//! Polling and discovery for Gree air conditioners reached through the
//! Gree cloud.
//!
//! This crate owns the runtime behaviour between the vendor SDK contracts
//! in `gree-cloud-api` and a home-automation host:
//!
//! - **[`DeviceCoordinator`]**: One per device. Refreshes on an interval,
//!   tolerates a bounded run of failures by serving the last snapshot, and
//!   pushes local edits under the same lock as refresh.
//!
//! - **[`DiscoveryService`]**: Lists the account's devices and runs each
//!   one through identity, bind, coordinator creation and first refresh.
//!   A failing device is skipped; the rest continue.
//!
//! - **[`GreeCloudRuntime`]**: Setup and ordered teardown for one account:
//!   login, broker session, discovery, polling tasks.
//!
//! - **Entities** ([`entity`]): Feature switches and device-registry info
//!   derived from coordinators.

pub mod budget;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod entity;
pub mod error;
pub mod runtime;
pub mod snapshot;
pub mod validate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use budget::{ErrorBudget, FailureKind, Settled};
pub use config::{DOMAIN, MAX_ERRORS, REQUEST_TIMEOUT, RuntimeConfig, UPDATE_INTERVAL};
pub use coordinator::{DeviceCoordinator, UpdateStatus};
pub use discovery::{DeviceStage, DiscoveryEvent, DiscoveryService, discovery_channel};
pub use entity::{DeviceRegistryInfo, GREE_SWITCHES, GreeSwitch, SwitchDescription, SwitchPlatform};
pub use error::CoreError;
pub use runtime::{GreeCloudRuntime, RuntimeState};
pub use snapshot::StateSnapshot;
pub use validate::{LoginCheckError, validate_credentials};
