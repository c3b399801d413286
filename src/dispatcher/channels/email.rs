//! SMTP email alert channel. Connection details (`host`, `port`, `username`,
//! `password`) are resolved from the referenced secret's keys at send time;
//! the transport is rebuilt on every send so credential rotation needs no
//! channel restart.

use std::sync::Arc;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::crd::channel::{ChannelKind, EmailConfig};
use crate::dispatcher::alert::Alert;
use crate::dispatcher::channel::Channel;
use crate::dispatcher::template::{self, DEFAULT_EMAIL_SUBJECT_TEMPLATE};
use crate::error::{DispatchError, Result};
use crate::platform::PlatformClient;

pub struct EmailChannel {
    name: String,
    namespace: String,
    config: EmailConfig,
    subject_template: String,
    platform: Arc<dyn PlatformClient>,
}

impl EmailChannel {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        config: EmailConfig,
        template: Option<String>,
        platform: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            config,
            subject_template: template.unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT_TEMPLATE.to_string()),
            platform,
        }
    }

    async fn secret_key(&self, key: &str) -> Result<String> {
        self.platform
            .get_secret_key(&self.namespace, &self.config.smtp_secret_name, key)
            .await
    }

    async fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self.secret_key("host").await?;
        let username = self.secret_key("username").await?;
        let password = self.secret_key("password").await?;
        let port: u16 = match self.secret_key("port").await {
            Ok(raw) => raw.parse().unwrap_or(587),
            Err(_) => 587,
        };

        let creds = Credentials::new(username, password);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .map_err(|e| DispatchError::RemoteRejected {
                channel: self.name.clone(),
                status: e.to_string(),
            })?
            .port(port)
            .credentials(creds)
            .build();
        Ok(transport)
    }

    async fn deliver(&self, subject: String, body: String) -> Result<()> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| DispatchError::Other(anyhow::anyhow!("invalid from address: {e}")))?;

        let transport = self.transport().await?;

        for recipient in &self.config.to {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| DispatchError::Other(anyhow::anyhow!("invalid to address: {e}")))?;

            let email = Message::builder()
                .from(from.clone())
                .to(to)
                .subject(subject.clone())
                .body(body.clone())
                .map_err(|e| DispatchError::Other(anyhow::anyhow!(e)))?;

            transport
                .send(email)
                .await
                .map_err(|e| DispatchError::RemoteRejected {
                    channel: self.name.clone(),
                    status: e.to_string(),
                })?;
        }

        Ok(())
    }
}

impl Channel for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let subject = template::render(&self.subject_template, alert)?;
        self.deliver(subject, alert.message.clone()).await
    }

    async fn test(&self) -> Result<()> {
        self.deliver("guardian test alert".to_string(), "this is a test alert from cronjob-guardian".to_string())
            .await
    }
}
