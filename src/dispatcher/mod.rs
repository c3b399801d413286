//! Alert dispatch pipeline (spec §4.4): per-channel delivery, bounded
//! concurrent sends, deduplication, rate limits, and active-alert lifecycle.

pub mod active_alert;
pub mod alert;
pub mod channel;
pub mod channels;
pub mod registry;
pub mod rate_limit;
pub mod suggested_fix;
pub mod template;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;

pub use active_alert::{ActiveAlert, ActiveAlertSet, FireDecision};
pub use alert::{Alert, AlertContext};
pub use channel::{Channel, ChannelDyn};
pub use registry::{ChannelRegistry, RegisteredChannel};
pub use rate_limit::TokenBucket;

use crate::crd::monitor::AlertingConfig;
use crate::error::{DispatchError, Result};
use crate::store::{AlertHistoryEntry, ChannelStats, Store};
use crate::AlertKey;

const DEFAULT_RENOTIFY_INTERVAL: chrono::Duration = chrono::Duration::hours(1);
const DEFAULT_CONSECUTIVE_FAILURES_THRESHOLD: u32 = 5;

/// Rate limit applied to the global alert bucket, independent of any
/// individual channel's own rate limit.
#[derive(Debug, Clone, Copy)]
pub struct GlobalRateLimit {
    pub max_alerts_per_hour: u32,
    pub burst_limit: u32,
}

impl Default for GlobalRateLimit {
    fn default() -> Self {
        Self {
            max_alerts_per_hour: 200,
            burst_limit: 20,
        }
    }
}

/// Outcome for a single destination channel.
#[derive(Debug, Clone)]
pub enum ChannelSendOutcome {
    Sent,
    Suppressed,
    RateLimited,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub channel_outcomes: Vec<(String, ChannelSendOutcome)>,
    pub deduplicated: bool,
}

pub struct Dispatcher {
    registry: ChannelRegistry,
    active_alerts: ActiveAlertSet,
    global_bucket: Mutex<TokenBucket>,
    recent_dispatches: Mutex<VecDeque<DateTime<Utc>>>,
    store: Arc<dyn Store>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_global_rate_limit(store, GlobalRateLimit::default())
    }

    pub fn with_global_rate_limit(store: Arc<dyn Store>, limits: GlobalRateLimit) -> Self {
        Self {
            registry: ChannelRegistry::new(),
            active_alerts: ActiveAlertSet::new(),
            global_bucket: Mutex::new(TokenBucket::new(limits.max_alerts_per_hour, limits.burst_limit)),
            recent_dispatches: Mutex::new(VecDeque::new()),
            store,
        }
    }

    pub fn register(&self, channel: Arc<dyn ChannelDyn>, rate_limit: crate::crd::channel::RateLimitPolicy) {
        self.registry.register(channel, rate_limit);
    }

    pub fn remove(&self, name: &str) {
        self.registry.remove(name);
    }

    pub fn set_global_rate_limits(&self, limits: GlobalRateLimit) {
        *self.global_bucket.lock().unwrap() =
            TokenBucket::new(limits.max_alerts_per_hour, limits.burst_limit);
    }

    /// Monotone window counter: dispatches attempted (fired, not
    /// deduplicated) in the trailing 24 hours.
    pub fn get_alert_count_24h(&self) -> usize {
        let mut recent = self.recent_dispatches.lock().unwrap();
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        while matches!(recent.front(), Some(t) if *t < cutoff) {
            recent.pop_front();
        }
        recent.len()
    }

    fn record_dispatch_attempt(&self) {
        self.recent_dispatches.lock().unwrap().push_back(Utc::now());
    }

    /// Resolves destination channels, enforces dedup/renotify and rate
    /// limits, and fans out to every resolved channel.
    pub async fn dispatch(
        &self,
        alert: Alert,
        alerting_cfg: Option<&AlertingConfig>,
        default_channels: &[String],
        now: DateTime<Utc>,
    ) -> Result<DispatchResult> {
        let renotify_interval = alerting_cfg
            .and_then(|c| c.renotify_interval)
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or(DEFAULT_RENOTIFY_INTERVAL);

        let decision = self.active_alerts.fire(
            &alert.key,
            &alert.alert_type,
            &alert.severity,
            &alert.message,
            renotify_interval,
            now,
        );

        self.store
            .append_alert_history(AlertHistoryEntry {
                key: alert.key.clone(),
                namespace: alert.namespace.clone(),
                cron_job_name: alert.cron_job_name.clone(),
                alert_type: alert.alert_type.clone(),
                severity: alert.severity.clone(),
                message: alert.message.clone(),
                fired_at: now,
                resolved_at: None,
            })
            .await
            .ok();

        if matches!(decision, FireDecision::Suppressed) {
            return Ok(DispatchResult {
                channel_outcomes: Vec::new(),
                deduplicated: true,
            });
        }

        self.record_dispatch_attempt();

        let names: Vec<String> = match alerting_cfg.map(|c| c.channels.as_slice()) {
            Some(explicit) if !explicit.is_empty() => explicit.to_vec(),
            _ => default_channels.to_vec(),
        };

        if names.is_empty() {
            return Ok(DispatchResult {
                channel_outcomes: Vec::new(),
                deduplicated: false,
            });
        }

        if !self.global_bucket.lock().unwrap().try_acquire() {
            let outcomes = names
                .into_iter()
                .map(|n| (n, ChannelSendOutcome::RateLimited))
                .collect();
            return Ok(DispatchResult {
                channel_outcomes: outcomes,
                deduplicated: false,
            });
        }

        let sends = names.iter().map(|name| self.send_with_bookkeeping(name, &alert));
        let outcomes = join_all(sends).await;

        Ok(DispatchResult {
            channel_outcomes: names.into_iter().zip(outcomes).collect(),
            deduplicated: false,
        })
    }

    /// Direct send bypassing dedup/renotify — used by tests and by
    /// per-channel validation (channel reconciler's `testOnSave`).
    pub async fn send_to_channel(&self, name: &str, alert: &Alert) -> Result<()> {
        let outcome = self.send_with_bookkeeping(name, alert).await;
        match outcome {
            ChannelSendOutcome::Sent => Ok(()),
            ChannelSendOutcome::Suppressed => Ok(()),
            ChannelSendOutcome::RateLimited => {
                Err(DispatchError::RateLimited(name.to_string()).into())
            }
            ChannelSendOutcome::Failed(e) => Err(DispatchError::RemoteRejected {
                channel: name.to_string(),
                status: e,
            }
            .into()),
        }
    }

    async fn send_with_bookkeeping(&self, name: &str, alert: &Alert) -> ChannelSendOutcome {
        let Some(registered) = self.registry.get(name) else {
            return ChannelSendOutcome::Failed(format!("channel not found: {name}"));
        };

        if !registered.rate_limiter.try_acquire() {
            return ChannelSendOutcome::RateLimited;
        }

        let mut stats = self.store.load_channel_stats(name).await.unwrap_or_default();
        let result = registered.channel.send(alert).await;

        let outcome = match &result {
            Ok(()) => {
                stats.alerts_sent_total += 1;
                stats.consecutive_failures = 0;
                stats.ready = true;
                stats.last_failed_error = None;
                ChannelSendOutcome::Sent
            }
            Err(e) => {
                stats.alerts_failed_total += 1;
                stats.consecutive_failures += 1;
                stats.last_failed_error = Some(e.to_string());
                if stats.consecutive_failures >= DEFAULT_CONSECUTIVE_FAILURES_THRESHOLD {
                    stats.ready = false;
                }
                ChannelSendOutcome::Failed(e.to_string())
            }
        };

        self.store.save_channel_stats(name, stats).await.ok();
        outcome
    }

    /// Removes the active-alert entry and persists a resolution record so a
    /// subsequent `dispatch` for the same key is treated as a fresh first
    /// fire.
    pub async fn clear_alert(&self, key: &AlertKey, now: DateTime<Utc>) -> Result<()> {
        self.active_alerts.clear(key);
        self.store.resolve_alert_history(key, now).await
    }

    pub fn active_alert(&self, key: &AlertKey) -> Option<ActiveAlert> {
        self.active_alerts.get(key)
    }

    pub fn active_alerts_for(&self, namespace: &str, cron_job_name: &str) -> Vec<ActiveAlert> {
        self.active_alerts.active_for_cron_job(namespace, cron_job_name)
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Sends a channel's own test payload, bypassing dedup/rate limits —
    /// used by the channel reconciler's `testOnSave` and by the read API's
    /// manual "test channel" action (spec §4.9, §6).
    pub async fn test_channel(&self, name: &str) -> Result<()> {
        let registered = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::ChannelNotFound(name.to_string()))?;
        registered.channel.test().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::channel::{ChannelKind, RateLimitPolicy};
    use crate::store::SqliteStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        name: String,
        sent: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Channel for CountingChannel {
        fn name(&self) -> &str {
            &self.name
        }
        fn kind(&self) -> ChannelKind {
            ChannelKind::Webhook
        }
        async fn send(&self, _alert: &Alert) -> Result<()> {
            if self.fail {
                return Err(DispatchError::RemoteRejected {
                    channel: self.name.clone(),
                    status: "500".into(),
                }
                .into());
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn test(&self) -> Result<()> {
            Ok(())
        }
    }

    async fn sqlite_store() -> Arc<SqliteStore> {
        Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap())
    }

    #[tokio::test]
    async fn dispatch_sends_on_first_fire() {
        let store = sqlite_store().await;
        let dispatcher = Dispatcher::new(store);
        let sent = Arc::new(AtomicUsize::new(0));
        dispatcher.register(
            Arc::new(CountingChannel {
                name: "oncall".into(),
                sent: sent.clone(),
                fail: false,
            }),
            RateLimitPolicy::default(),
        );

        let alert = Alert::new("default", "nightly-backup", "JobFailed", "critical", "t", "m");
        let result = dispatcher
            .dispatch(alert, None, &["oncall".to_string()], Utc::now())
            .await
            .unwrap();

        assert!(!result.deduplicated);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.channel_outcomes[0].1,
            ChannelSendOutcome::Sent
        ));
    }

    #[tokio::test]
    async fn dispatch_dedups_within_renotify_window() {
        let store = sqlite_store().await;
        let dispatcher = Dispatcher::new(store);
        let sent = Arc::new(AtomicUsize::new(0));
        dispatcher.register(
            Arc::new(CountingChannel {
                name: "oncall".into(),
                sent: sent.clone(),
                fail: false,
            }),
            RateLimitPolicy::default(),
        );

        let cfg = crate::crd::monitor::AlertingConfig {
            channels: vec!["oncall".into()],
            renotify_interval: Some(std::time::Duration::from_secs(3600)),
            include_context: Default::default(),
        };

        let t0 = Utc::now();
        let alert1 = Alert::new("default", "nightly-backup", "JobFailed", "critical", "t", "m");
        dispatcher
            .dispatch(alert1, Some(&cfg), &[], t0)
            .await
            .unwrap();

        let t1 = t0 + chrono::Duration::minutes(10);
        let alert2 = Alert::new("default", "nightly-backup", "JobFailed", "critical", "t", "m2");
        let second = dispatcher
            .dispatch(alert2, Some(&cfg), &[], t1)
            .await
            .unwrap();

        assert!(second.deduplicated);
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn clear_then_dispatch_is_fresh_first_fire() {
        let store = sqlite_store().await;
        let dispatcher = Dispatcher::new(store);
        let sent = Arc::new(AtomicUsize::new(0));
        dispatcher.register(
            Arc::new(CountingChannel {
                name: "oncall".into(),
                sent: sent.clone(),
                fail: false,
            }),
            RateLimitPolicy::default(),
        );

        let cfg = crate::crd::monitor::AlertingConfig {
            channels: vec!["oncall".into()],
            renotify_interval: Some(std::time::Duration::from_secs(3600)),
            include_context: Default::default(),
        };

        let key = crate::alert_key("default", "nightly-backup", "JobFailed");
        let t0 = Utc::now();
        let alert1 = Alert::new("default", "nightly-backup", "JobFailed", "critical", "t", "m");
        dispatcher.dispatch(alert1, Some(&cfg), &[], t0).await.unwrap();

        dispatcher.clear_alert(&key, t0 + chrono::Duration::minutes(1)).await.unwrap();

        let alert2 = Alert::new("default", "nightly-backup", "JobFailed", "critical", "t", "m2");
        let result = dispatcher
            .dispatch(alert2, Some(&cfg), &[], t0 + chrono::Duration::minutes(2))
            .await
            .unwrap();

        assert!(!result.deduplicated);
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn consecutive_failures_flip_ready_false() {
        let store = sqlite_store().await;
        let dispatcher = Dispatcher::new(store.clone());
        dispatcher.register(
            Arc::new(CountingChannel {
                name: "flaky".into(),
                sent: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }),
            RateLimitPolicy::default(),
        );

        for _ in 0..5 {
            let alert = Alert::new("default", "nightly-backup", "JobFailed", "critical", "t", "m");
            let _ = dispatcher.send_to_channel("flaky", &alert).await;
        }

        let stats = store.load_channel_stats("flaky").await.unwrap();
        assert_eq!(stats.consecutive_failures, 5);
        assert!(!stats.ready);
    }

    #[tokio::test]
    async fn empty_destination_set_is_recorded_not_an_error() {
        let store = sqlite_store().await;
        let dispatcher = Dispatcher::new(store);
        let alert = Alert::new("default", "nightly-backup", "JobFailed", "critical", "t", "m");
        let result = dispatcher.dispatch(alert, None, &[], Utc::now()).await.unwrap();
        assert!(result.channel_outcomes.is_empty());
        assert!(!result.deduplicated);
    }
}
