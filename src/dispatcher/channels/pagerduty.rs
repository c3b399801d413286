//! PagerDuty Events API v2 channel: triggers an incident via the routing
//! key resolved from a secret reference.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::crd::channel::{ChannelKind, PagerDutyConfig};
use crate::dispatcher::alert::Alert;
use crate::dispatcher::channel::Channel;
use crate::dispatcher::template::{self, DEFAULT_PAGERDUTY_TEMPLATE};
use crate::error::{DispatchError, Result};
use crate::platform::PlatformClient;

const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct EventPayload<'a> {
    summary: &'a str,
    source: &'a str,
    severity: &'a str,
}

#[derive(Serialize)]
struct EnqueueRequest<'a> {
    routing_key: &'a str,
    event_action: &'a str,
    dedup_key: &'a str,
    payload: EventPayload<'a>,
}

/// Maps guardian severities onto the fixed PagerDuty severity vocabulary.
fn pagerduty_severity(severity: &str) -> &'static str {
    match severity {
        "critical" => "critical",
        "warning" => "warning",
        _ => "info",
    }
}

pub struct PagerDutyChannel {
    name: String,
    namespace: String,
    config: PagerDutyConfig,
    template: String,
    platform: Arc<dyn PlatformClient>,
    client: Client,
}

impl PagerDutyChannel {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        config: PagerDutyConfig,
        template: Option<String>,
        platform: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            config,
            template: template.unwrap_or_else(|| DEFAULT_PAGERDUTY_TEMPLATE.to_string()),
            platform,
            client: Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .expect("static reqwest client config"),
        }
    }

    async fn routing_key(&self) -> Result<String> {
        self.platform
            .get_secret_key(
                &self.namespace,
                &self.config.routing_key_secret_ref.name,
                &self.config.routing_key_secret_ref.key,
            )
            .await
    }

    async fn enqueue(&self, dedup_key: &str, summary: &str, severity: &str) -> Result<()> {
        let routing_key = self.routing_key().await?;
        let request = EnqueueRequest {
            routing_key: &routing_key,
            event_action: "trigger",
            dedup_key,
            payload: EventPayload {
                summary,
                source: "cronjob-guardian",
                severity,
            },
        };

        let response = self
            .client
            .post(EVENTS_API_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| DispatchError::RemoteRejected {
                channel: self.name.clone(),
                status: e.to_string(),
            })?;

        // Spec §4.4 "HTTP error policy": 200-204 is success, anything else
        // (including other 2xx) is a failure.
        if !(200..=204).contains(&response.status().as_u16()) {
            return Err(DispatchError::RemoteRejected {
                channel: self.name.clone(),
                status: response.status().to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Channel for PagerDutyChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Pagerduty
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let summary = template::render(&self.template, alert)?;
        self.enqueue(&alert.key, &summary, pagerduty_severity(&alert.severity))
            .await
    }

    async fn test(&self) -> Result<()> {
        self.enqueue("guardian-test", "guardian test alert", "info").await
    }
}
