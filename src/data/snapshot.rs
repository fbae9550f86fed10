//! The per-source snapshot and the aggregated view consumers read.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::source::{FailureReason, Payload};

/// The last known outcome of one source.
///
/// Overwritten whole by the next completed fetch, never merged with history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub data: Payload,
    pub error: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Milliseconds since the Unix epoch; `None` until the first fetch.
    #[serde(rename = "fetchedAt")]
    pub fetched_at_ms: Option<u64>,
}

impl Snapshot {
    /// The snapshot of a source that has not been fetched yet.
    pub fn initial(default: Payload) -> Self {
        Self {
            data: default,
            error: None,
            message: None,
            fetched_at_ms: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched_at_ms.is_some()
    }
}

/// Derived health of a whole view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// No cycle has been applied yet.
    Unknown,
    Ok,
    Offline,
}

/// One internally consistent set of snapshots, one per configured source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedView {
    /// The poll cycle that produced this view; 0 before the first cycle.
    pub cycle: u64,
    pub overall_status: OverallStatus,
    pub liveness: String,
    pub sources: BTreeMap<String, Snapshot>,
}

impl AggregatedView {
    pub fn get(&self, source: &str) -> Option<&Snapshot> {
        self.sources.get(source)
    }

    /// The current data of `source`, fallback included.
    pub fn data(&self, source: &str) -> Option<&Payload> {
        self.sources.get(source).map(|s| &s.data)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn is_offline(&self) -> bool {
        self.overall_status == OverallStatus::Offline
    }

    /// Sources whose latest fetch failed.
    pub fn failing(&self) -> impl Iterator<Item = (&str, &Snapshot)> {
        self.sources
            .iter()
            .filter(|(_, s)| !s.is_ok())
            .map(|(name, s)| (name.as_str(), s))
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
