//! Generic webhook alert channel: POSTs the rendered template body to an
//! arbitrary URL with optional static headers and a secret-backed auth
//! header.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::crd::channel::{ChannelKind, WebhookConfig};
use crate::dispatcher::alert::Alert;
use crate::dispatcher::channel::Channel;
use crate::dispatcher::template::{self, DEFAULT_WEBHOOK_TEMPLATE};
use crate::error::{DispatchError, Result};
use crate::platform::PlatformClient;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookChannel {
    name: String,
    namespace: String,
    config: WebhookConfig,
    template: String,
    platform: Arc<dyn PlatformClient>,
    client: Client,
}

impl WebhookChannel {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        config: WebhookConfig,
        template: Option<String>,
        platform: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            config,
            template: template.unwrap_or_else(|| DEFAULT_WEBHOOK_TEMPLATE.to_string()),
            platform,
            client: Client::builder()
                .timeout(SEND_TIMEOUT)
                .build()
                .expect("static reqwest client config"),
        }
    }

    async fn send_body(&self, body: String) -> Result<()> {
        let mut request = self.client.post(&self.config.url).body(body);

        for (key, value) in &self.config.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        if let Some(secret_ref) = &self.config.auth_header_secret_ref {
            let token = self
                .platform
                .get_secret_key(&self.namespace, &secret_ref.name, &secret_ref.key)
                .await?;
            request = request.header("Authorization", token);
        }

        let response = request
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

impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let body = template::render(&self.template, alert)?;
        self.send_body(body).await
    }

    async fn test(&self) -> Result<()> {
        self.send_body("guardian test alert".to_string()).await
    }
}
