//! `CronJobMonitor` custom resource: selector + alerting + SLA + remediation
//! + dataRetention + maintenanceWindows (spec §3, §6).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::selector::Selector;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "guardian.cronjobs.io",
    version = "v1alpha1",
    kind = "CronJobMonitor",
    plural = "cronjobmonitors",
    shortname = "cjm",
    namespaced,
    status = "MonitorStatus"
)]
pub struct MonitorSpec {
    pub selector: Selector,

    #[serde(default)]
    pub dead_man_switch: Option<DeadManSwitchConfig>,

    #[serde(default)]
    pub sla: Option<SlaConfig>,

    #[serde(default)]
    pub alerting: Option<AlertingConfig>,

    #[serde(default)]
    pub remediation: Option<RemediationConfig>,

    #[serde(default)]
    pub data_retention: DataRetentionConfig,

    #[serde(default)]
    pub maintenance_windows: Vec<MaintenanceWindow>,

    /// IANA timezone for schedule/maintenance-window evaluation. Defaults to
    /// the process timezone when absent.
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DeadManSwitchConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Explicit maximum time since last success. Takes priority over
    /// `auto_from_schedule` when set.
    #[serde(default, with = "humantime_serde::option")]
    #[schemars(with = "Option<String>")]
    pub max_time_since_last_success: Option<std::time::Duration>,

    #[serde(default)]
    pub auto_from_schedule: Option<AutoFromScheduleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AutoFromScheduleConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Added to the schedule-derived expected interval. Defaults to 1 hour.
    #[serde(default, with = "humantime_serde::option")]
    #[schemars(with = "Option<String>")]
    pub buffer: Option<std::time::Duration>,

    #[serde(default)]
    pub missed_schedule_threshold: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SlaConfig {
    #[serde(default)]
    pub window_days: Option<u32>,

    #[serde(default)]
    pub min_success_rate: Option<f64>,

    #[serde(default, with = "humantime_serde::option")]
    #[schemars(with = "Option<String>")]
    pub max_duration: Option<std::time::Duration>,

    #[serde(default)]
    pub duration_regression_threshold_percent: Option<f64>,

    #[serde(default)]
    pub baseline_window_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AlertingConfig {
    /// Explicit destination channel names. Empty means "use the default set".
    #[serde(default)]
    pub channels: Vec<String>,

    #[serde(default, with = "humantime_serde::option")]
    #[schemars(with = "Option<String>")]
    pub renotify_interval: Option<std::time::Duration>,

    #[serde(default)]
    pub include_context: IncludeContextConfig,

    /// User-supplied suggested-fix overrides, checked before the built-in
    /// rule table (spec §4.7). Higher `priority` matches first.
    #[serde(default)]
    pub suggested_fix_patterns: Vec<SuggestedFixPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SuggestedFixPattern {
    #[serde(default)]
    pub priority: i32,

    #[serde(rename = "match")]
    pub matcher: SuggestedFixMatcher,

    pub template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SuggestedFixMatcher {
    ExitCode { exit_code: i32 },
    ExitCodeRange { min_exit_code: i32, max_exit_code: i32 },
    Reason { reason: String },
    Regex { pattern: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct IncludeContextConfig {
    #[serde(default)]
    pub exit_code: bool,
    #[serde(default)]
    pub reason: bool,
    #[serde(default)]
    pub suggested_fix: bool,
    #[serde(default)]
    pub logs: bool,
    #[serde(default)]
    pub events: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RemediationConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub auto_retry: Option<AutoRetryConfig>,

    #[serde(default)]
    pub kill_stuck: Option<KillStuckConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AutoRetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default, with = "humantime_serde::option")]
    #[schemars(with = "Option<String>")]
    pub delay_between_retries: Option<std::time::Duration>,

    #[serde(default)]
    pub only_for_exit_codes: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KillStuckConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub after_duration: std::time::Duration,

    #[serde(default)]
    pub propagation_policy: PropagationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PropagationPolicy {
    #[default]
    Foreground,
    Orphan,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecreationPolicy {
    Reset,
    Retain,
}

impl Default for RecreationPolicy {
    fn default() -> Self {
        RecreationPolicy::Retain
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataRetentionConfig {
    #[serde(default)]
    pub on_recreation: RecreationPolicy,

    #[serde(default)]
    pub store_logs: bool,

    #[serde(default)]
    pub store_events: bool,

    #[serde(default)]
    pub max_log_size_kb: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MaintenanceWindow {
    pub name: String,

    /// Cron-style schedule describing when the window opens.
    pub schedule: String,

    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub duration: std::time::Duration,

    /// Overrides the monitor-level timezone for this window only.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Observed status (spec §3: Monitor.Status).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MonitorStatus {
    #[serde(default)]
    pub phase: MonitorPhase,

    #[serde(default)]
    pub cron_jobs: BTreeMap<String, CronJobStatusEntry>,

    #[serde(default)]
    pub summary: MonitorSummary,

    #[serde(default)]
    pub last_reconcile_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum MonitorPhase {
    #[default]
    Pending,
    Ready,
    Degraded,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MonitorSummary {
    pub healthy: u32,
    pub warning: u32,
    pub critical: u32,
    pub suspended: u32,
    pub total: u32,
    pub active_alerts: u32,
}

/// Per-matched-cron-job status (spec §3: CronJobStatus).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CronJobStatusEntry {
    pub namespace: String,
    pub name: String,
    pub status: CronJobHealthTag,

    pub success_rate: f64,
    pub runs_in_window: u64,
    pub p50_duration_secs: Option<f64>,
    pub p95_duration_secs: Option<f64>,
    pub p99_duration_secs: Option<f64>,

    pub last_successful_time: Option<DateTime<Utc>>,
    pub next_scheduled_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub active_alerts: Vec<String>,

    pub last_remediation: Option<RemediationRecord>,

    #[serde(default)]
    pub missed_schedule_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CronJobHealthTag {
    Healthy,
    Warning,
    Critical,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RemediationRecord {
    pub action: String,
    pub outcome: String,
    pub at: DateTime<Utc>,
}
