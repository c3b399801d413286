//! Concrete `Channel` implementations and the kind-dispatching constructor
//! used by the channel reconciler (spec §4.4, §4.9).

pub mod email;
pub mod pagerduty;
pub mod slack;
pub mod webhook;

use std::sync::Arc;

pub use email::EmailChannel;
pub use pagerduty::PagerDutyChannel;
pub use slack::SlackChannel;
pub use webhook::WebhookChannel;

use crate::crd::channel::ChannelSpec;
use crate::dispatcher::channel::ChannelDyn;
use crate::error::{ConfigError, Result};
use crate::platform::PlatformClient;

/// Builds the live channel handle matching `spec.kind`, validating that the
/// kind-specific config block the kind requires is present.
pub fn build_channel(
    name: &str,
    namespace: &str,
    spec: &ChannelSpec,
    platform: Arc<dyn PlatformClient>,
) -> Result<Arc<dyn ChannelDyn>> {
    use crate::crd::channel::ChannelKind;

    let template = spec.template.clone();

    let channel: Arc<dyn ChannelDyn> = match spec.kind {
        ChannelKind::Slack => {
            let config = spec.slack.clone().ok_or_else(|| {
                ConfigError::Invalid(format!("channel {name}: kind slack requires `slack` config"))
            })?;
            Arc::new(SlackChannel::new(name, namespace, config, template, platform)?)
        }
        ChannelKind::Webhook => {
            let config = spec.webhook.clone().ok_or_else(|| {
                ConfigError::Invalid(format!("channel {name}: kind webhook requires `webhook` config"))
            })?;
            Arc::new(WebhookChannel::new(name, namespace, config, template, platform))
        }
        ChannelKind::Pagerduty => {
            let config = spec.pagerduty.clone().ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "channel {name}: kind pagerduty requires `pagerduty` config"
                ))
            })?;
            Arc::new(PagerDutyChannel::new(name, namespace, config, template, platform))
        }
        ChannelKind::Email => {
            let config = spec.email.clone().ok_or_else(|| {
                ConfigError::Invalid(format!("channel {name}: kind email requires `email` config"))
            })?;
            Arc::new(EmailChannel::new(name, namespace, config, template, platform))
        }
    };

    Ok(channel)
}
