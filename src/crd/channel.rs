//! `AlertChannel` custom resource: kind + kind-specific config + rate
//! limiting + template + testOnSave (spec §4.4, §6).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "guardian.cronjobs.io",
    version = "v1alpha1",
    kind = "AlertChannel",
    plural = "alertchannels",
    shortname = "ach",
    namespaced,
    status = "ChannelStatus"
)]
pub struct ChannelSpec {
    pub kind: ChannelKind,

    #[serde(default)]
    pub slack: Option<SlackConfig>,

    #[serde(default)]
    pub webhook: Option<WebhookConfig>,

    #[serde(default)]
    pub pagerduty: Option<PagerDutyConfig>,

    #[serde(default)]
    pub email: Option<EmailConfig>,

    #[serde(default)]
    pub rate_limiting: RateLimitPolicy,

    /// Template body. Defaults to a built-in template for the channel kind
    /// when absent.
    #[serde(default)]
    pub template: Option<String>,

    #[serde(default)]
    pub test_on_save: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Slack,
    Webhook,
    Pagerduty,
    Email,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Slack => "slack",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Pagerduty => "pagerduty",
            ChannelKind::Email => "email",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference to a key within a Kubernetes `Secret`, resolved at send time
/// (never cached) so credential rotations take effect without a restart.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SlackConfig {
    pub webhook_url_secret_ref: SecretKeyRef,
    #[serde(default)]
    pub channel_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub headers: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub auth_header_secret_ref: Option<SecretKeyRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PagerDutyConfig {
    pub routing_key_secret_ref: SecretKeyRef,
}

/// SMTP connection details live entirely in the referenced secret (keys
/// `host`, `port`, `username`, `password`) so no connection detail beyond
/// the envelope addresses appears in the `AlertChannel` spec itself.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmailConfig {
    pub from: String,
    pub to: Vec<String>,
    pub smtp_secret_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RateLimitPolicy {
    #[serde(default = "default_max_alerts_per_hour")]
    pub max_alerts_per_hour: u32,
    #[serde(default = "default_burst_limit")]
    pub burst_limit: u32,
}

fn default_max_alerts_per_hour() -> u32 {
    30
}

fn default_burst_limit() -> u32 {
    5
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_alerts_per_hour: default_max_alerts_per_hour(),
            burst_limit: default_burst_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ChannelStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub reason: Option<String>,

    #[serde(default)]
    pub last_test_result: Option<String>,
    #[serde(default)]
    pub last_test_error: Option<String>,
    #[serde(default)]
    pub last_test_time: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default)]
    pub alerts_sent_total: u64,
    #[serde(default)]
    pub alerts_failed_total: u64,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub last_failed_error: Option<String>,
}
