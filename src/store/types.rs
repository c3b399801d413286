//! Persistent record types owned by the store (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed run of a cron job (spec §3: Execution).
///
/// Invariants: `completion >= start`; `duration = completion - start` once
/// `completion` is set; `succeeded => exit_code == Some(0)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Execution {
    pub namespace: String,
    pub cron_job_name: String,
    /// Opaque identity token for the current cron-job incarnation (its
    /// Kubernetes UID). Changes if the cron job is deleted and recreated.
    pub cron_job_uid: String,
    pub job_name: String,

    pub start_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,

    pub succeeded: bool,
    pub exit_code: Option<i32>,
    pub termination_reason: Option<String>,

    pub retry: bool,
    pub retry_of: Option<String>,

    pub logs: Option<String>,
    pub events: Option<serde_json::Value>,
}

impl Execution {
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completion_time.map(|end| end - self.start_time)
    }
}

/// Counters + percentiles for a cron job over a trailing window (spec §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Metrics {
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub p50_duration_secs: Option<f64>,
    pub p95_duration_secs: Option<f64>,
    pub p99_duration_secs: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percentile {
    P50,
    P95,
    P99,
}

impl Percentile {
    pub fn fraction(self) -> f64 {
        match self {
            Percentile::P50 => 0.50,
            Percentile::P95 => 0.95,
            Percentile::P99 => 0.99,
        }
    }
}

/// A fired or resolved alert, recorded durably (spec §3: AlertHistory).
/// Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertHistoryEntry {
    pub key: crate::AlertKey,
    pub namespace: String,
    pub cron_job_name: String,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub fired_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Per-channel send statistics (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChannelStats {
    pub alerts_sent_total: u64,
    pub alerts_failed_total: u64,
    pub consecutive_failures: u32,
    pub last_failed_error: Option<String>,
    pub ready: bool,
}

/// Identity of a cron job for store lookups that span executions and
/// recreation bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CronJobRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub ok: bool,
}
