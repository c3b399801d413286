//! `GuardianConfig` singleton custom resource: cluster-wide defaults that
//! apply when a `CronJobMonitor` does not override them (spec §3, §6).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The only object of this kind the reconciler honors is named `default`.
pub const SINGLETON_NAME: &str = "default";

#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "guardian.cronjobs.io",
    version = "v1alpha1",
    kind = "GuardianConfig",
    plural = "guardianconfigs",
    shortname = "gcfg",
    status = "GuardianConfigStatus"
)]
pub struct GuardianConfigSpec {
    #[serde(default)]
    pub global_rate_limiting: GlobalRateLimitConfig,

    /// Namespaces excluded from discovery entirely, even if a monitor's
    /// selector would otherwise match a cron job inside them.
    #[serde(default)]
    pub ignored_namespaces: Vec<String>,

    #[serde(default)]
    pub history_retention: HistoryRetentionConfig,

    /// Default channel names applied when a monitor's `alerting.channels`
    /// is empty.
    #[serde(default)]
    pub default_channels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GlobalRateLimitConfig {
    /// Equivalent to spec §4.4's `maxAlertsPerMinute`, expressed as an
    /// hourly rate since the underlying token bucket refills continuously
    /// and is unit-agnostic; `max_alerts_per_hour / 60` is the per-minute
    /// rate the spec describes.
    #[serde(default = "default_max_alerts_per_hour")]
    pub max_alerts_per_hour: u32,

    #[serde(default = "default_alert_burst_limit")]
    pub alert_burst_limit: u32,

    #[serde(default = "default_max_remediations_per_hour")]
    pub max_remediations_per_hour: u32,

    #[serde(default = "default_remediation_burst_limit")]
    pub remediation_burst_limit: u32,
}

fn default_max_alerts_per_hour() -> u32 {
    200
}

fn default_alert_burst_limit() -> u32 {
    20
}

fn default_max_remediations_per_hour() -> u32 {
    50
}

fn default_remediation_burst_limit() -> u32 {
    10
}

impl Default for GlobalRateLimitConfig {
    fn default() -> Self {
        Self {
            max_alerts_per_hour: default_max_alerts_per_hour(),
            alert_burst_limit: default_alert_burst_limit(),
            max_remediations_per_hour: default_max_remediations_per_hour(),
            remediation_burst_limit: default_remediation_burst_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryRetentionConfig {
    #[serde(default = "default_execution_retention_days")]
    pub execution_days: u32,

    #[serde(default = "default_alert_retention_days")]
    pub alert_days: u32,
}

fn default_execution_retention_days() -> u32 {
    30
}

fn default_alert_retention_days() -> u32 {
    90
}

impl Default for HistoryRetentionConfig {
    fn default() -> Self {
        Self {
            execution_days: default_execution_retention_days(),
            alert_days: default_alert_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GuardianConfigStatus {
    #[serde(default)]
    pub accepted: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}
