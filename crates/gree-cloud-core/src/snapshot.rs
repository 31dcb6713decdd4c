// ── Immutable device state ──

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gree_cloud_api::RawProperties;

/// A point-in-time copy of a device's properties.
///
/// Cheap to clone and impossible to mutate in place, so handing one out
/// never exposes the device handle's live state. Callers that want to
/// edit a copy use [`to_properties`](Self::to_properties).
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    properties: Arc<RawProperties>,
    fetched_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Capture the current properties of a device handle.
    pub fn capture(properties: &RawProperties) -> Self {
        Self {
            properties: Arc::new(properties.clone()),
            fetched_at: Utc::now(),
        }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.properties.get(name).copied()
    }

    /// Vendor boolean properties are `0`/`1`.
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| v != 0)
    }

    pub fn properties(&self) -> &RawProperties {
        &self.properties
    }

    /// An owned, editable copy of the properties.
    pub fn to_properties(&self) -> RawProperties {
        self.properties.as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// When this snapshot was taken.
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// Snapshots compare by content only.
impl PartialEq for StateSnapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.properties, &other.properties) || self.properties == other.properties
    }
}

impl Eq for StateSnapshot {}

impl From<BTreeMap<String, i64>> for StateSnapshot {
    fn from(properties: BTreeMap<String, i64>) -> Self {
        Self {
            properties: Arc::new(properties),
            fetched_at: Utc::now(),
        }
    }
}
