//! Channel name → live handle registry (spec §4.4). A single mutex guards
//! the map, per spec §5's shared-state model.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::channel::ChannelDyn;
use super::rate_limit::TokenBucket;
use crate::crd::channel::RateLimitPolicy;

/// A registered channel handle paired with the per-channel token bucket
/// derived from its `RateLimitPolicy` (spec §4.4).
pub struct RegisteredChannel {
    pub channel: Arc<dyn ChannelDyn>,
    pub rate_limiter: TokenBucket,
}

#[derive(Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, Arc<RegisteredChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering a name that already exists replaces the handle.
    pub fn register(&self, channel: Arc<dyn ChannelDyn>, rate_limit: RateLimitPolicy) {
        let registered = Arc::new(RegisteredChannel {
            rate_limiter: TokenBucket::new(rate_limit.max_alerts_per_hour, rate_limit.burst_limit),
            channel,
        });
        self.channels
            .lock()
            .unwrap()
            .insert(registered.channel.name().to_string(), registered);
    }

    pub fn remove(&self, name: &str) -> Option<Arc<RegisteredChannel>> {
        self.channels.lock().unwrap().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredChannel>> {
        self.channels.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.channels.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::channel::ChannelKind;
    use crate::dispatcher::alert::Alert;
    use crate::error::Result;

    struct StubChannel(&'static str);

    impl super::super::channel::Channel for StubChannel {
        fn name(&self) -> &str {
            self.0
        }
        fn kind(&self) -> ChannelKind {
            ChannelKind::Webhook
        }
        async fn send(&self, _alert: &Alert) -> Result<()> {
            Ok(())
        }
        async fn test(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn register_replaces_existing_handle_with_same_name() {
        let registry = ChannelRegistry::new();
        registry.register(Arc::new(StubChannel("oncall")), RateLimitPolicy::default());
        assert!(registry.get("oncall").is_some());
        registry.register(Arc::new(StubChannel("oncall")), RateLimitPolicy::default());
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn remove_drops_the_handle() {
        let registry = ChannelRegistry::new();
        registry.register(Arc::new(StubChannel("oncall")), RateLimitPolicy::default());
        registry.remove("oncall");
        assert!(registry.get("oncall").is_none());
    }
}
