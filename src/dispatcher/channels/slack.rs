//! Slack alert channel: posts to an incoming-webhook URL resolved from a
//! secret reference at send time.

use std::sync::Arc;

use slack_morphism::prelude::*;

use crate::crd::channel::{ChannelKind, SlackConfig};
use crate::dispatcher::alert::Alert;
use crate::dispatcher::channel::Channel;
use crate::dispatcher::template::{self, DEFAULT_SLACK_TEMPLATE};
use crate::error::{DispatchError, Result};
use crate::platform::PlatformClient;

pub struct SlackChannel {
    name: String,
    namespace: String,
    config: SlackConfig,
    template: String,
    platform: Arc<dyn PlatformClient>,
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
}

impl SlackChannel {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        config: SlackConfig,
        template: Option<String>,
        platform: Arc<dyn PlatformClient>,
    ) -> Result<Self> {
        let client = Arc::new(SlackClient::new(
            SlackClientHyperConnector::new()
                .map_err(|e| DispatchError::Other(anyhow::anyhow!(e)))?,
        ));
        Ok(Self {
            name: name.into(),
            namespace: namespace.into(),
            config,
            template: template.unwrap_or_else(|| DEFAULT_SLACK_TEMPLATE.to_string()),
            platform,
            client,
        })
    }

    async fn webhook_url(&self) -> Result<String> {
        self.platform
            .get_secret_key(
                &self.namespace,
                &self.config.webhook_url_secret_ref.name,
                &self.config.webhook_url_secret_ref.key,
            )
            .await
    }
}

impl Channel for SlackChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let text = template::render(&self.template, alert)?;
        let url = self.webhook_url().await?;
        let webhook_url: SlackWebhookUrl = url
            .parse()
            .map_err(|_| DispatchError::SecretResolution("invalid slack webhook url".into()))?;

        let mut message = SlackMessageContent::new().with_text(text);
        if let Some(channel) = &self.config.channel_override {
            message = message.with_channel(channel.clone().into());
        }

        self.client
            .post_webhook_message(&webhook_url, &SlackApiPostWebhookMessageRequest::new(message))
            .await
            .map_err(|e| {
                DispatchError::RemoteRejected {
                    channel: self.name.clone(),
                    status: e.to_string(),
                }
            })?;

        Ok(())
    }

    async fn test(&self) -> Result<()> {
        let url = self.webhook_url().await?;
        let webhook_url: SlackWebhookUrl = url
            .parse()
            .map_err(|_| DispatchError::SecretResolution("invalid slack webhook url".into()))?;

        self.client
            .post_webhook_message(
                &webhook_url,
                &SlackApiPostWebhookMessageRequest::new(
                    SlackMessageContent::new().with_text("guardian test alert".to_string()),
                ),
            )
            .await
            .map_err(|e| DispatchError::RemoteRejected {
                channel: self.name.clone(),
                status: e.to_string(),
            })?;

        Ok(())
    }
}
