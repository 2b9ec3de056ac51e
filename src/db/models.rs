//! Database model types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One polling observation as written by the monitor daemon.
#[derive(Debug, Clone)]
pub struct NewSample {
    pub timestamp: DateTime<Utc>,
    pub tracked_aircraft: i64,
    pub uploaded_aircraft: Option<i64>,
    pub endpoint: String,
    pub feed_status: Option<String>,
    pub feed_server: Option<String>,
}

/// A stored polling observation.
///
/// `timestamp` is `None` when the stored text fails to parse; callers render
/// it as "N/A" rather than dropping the row.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSample {
    pub timestamp: Option<DateTime<Utc>>,
    pub tracked_aircraft: i64,
    pub uploaded_aircraft: Option<i64>,
    pub endpoint: String,
    pub feed_status: Option<String>,
    pub feed_server: Option<String>,
}

/// One reboot/remediation decision as written by the monitor daemon.
///
/// `threshold` carries the configured trigger value actually in force at
/// decision time, for audit fidelity.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub timestamp: DateTime<Utc>,
    pub tracked_aircraft: i64,
    pub threshold: i64,
    pub reason: String,
    /// True when the decision was logged only and no action was taken.
    pub dry_run: bool,
    pub uptime_hours: f64,
    pub endpoint: String,
}

/// A stored remediation event. `id` is unique and stable for the record's
/// lifetime and is the only supported delete key.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationEvent {
    pub id: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub tracked_aircraft: i64,
    pub threshold: i64,
    pub reason: String,
    pub dry_run: bool,
    pub uptime_hours: f64,
    pub endpoint: String,
}

/// Per-table deletion counts reported by a prune pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PruneOutcome {
    pub samples_deleted: usize,
    pub events_deleted: usize,
}

impl PruneOutcome {
    pub fn total(&self) -> usize {
        self.samples_deleted + self.events_deleted
    }
}
