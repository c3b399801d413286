//! In-memory active-alert set: dedup + renotify cadence (spec §3, §4.4).

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AlertKey;

#[derive(Debug, Clone, Serialize)]
pub struct ActiveAlert {
    pub key: AlertKey,
    pub alert_type: String,
    pub severity: String,
    pub message: String,
    pub since: DateTime<Utc>,
    pub last_notified: DateTime<Utc>,
    pub notification_count: u32,
}

/// Whether a fresh `Dispatch` call for an existing or new key should emit an
/// outbound send.
pub enum FireDecision {
    /// First time this key fires; always sends.
    FirstFire,
    /// Already active; sends only if the renotify interval elapsed.
    Renotify,
    /// Already active and within the renotify window; message/context was
    /// updated but no outbound send happens.
    Suppressed,
}

#[derive(Default)]
pub struct ActiveAlertSet {
    alerts: Mutex<HashMap<AlertKey, ActiveAlert>>,
}

impl ActiveAlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fire for `key`, returning the decision and the (possibly
    /// newly created) entry.
    pub fn fire(
        &self,
        key: &AlertKey,
        alert_type: &str,
        severity: &str,
        message: &str,
        renotify_interval: chrono::Duration,
        now: DateTime<Utc>,
    ) -> FireDecision {
        let mut alerts = self.alerts.lock().unwrap();

        match alerts.get_mut(key) {
            None => {
                alerts.insert(
                    key.clone(),
                    ActiveAlert {
                        key: key.clone(),
                        alert_type: alert_type.to_string(),
                        severity: severity.to_string(),
                        message: message.to_string(),
                        since: now,
                        last_notified: now,
                        notification_count: 1,
                    },
                );
                FireDecision::FirstFire
            }
            Some(existing) => {
                existing.message = message.to_string();
                existing.severity = severity.to_string();
                if now - existing.last_notified >= renotify_interval {
                    existing.last_notified = now;
                    existing.notification_count += 1;
                    FireDecision::Renotify
                } else {
                    FireDecision::Suppressed
                }
            }
        }
    }

    /// Removes the entry for `key` so the next `fire` is treated as a fresh
    /// first fire, regardless of any prior renotify timer.
    pub fn clear(&self, key: &AlertKey) -> Option<ActiveAlert> {
        self.alerts.lock().unwrap().remove(key)
    }

    pub fn get(&self, key: &AlertKey) -> Option<ActiveAlert> {
        self.alerts.lock().unwrap().get(key).cloned()
    }

    pub fn active_for_cron_job(&self, namespace: &str, cron_job_name: &str) -> Vec<ActiveAlert> {
        let prefix = format!("{namespace}/{cron_job_name}/");
        self.alerts
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.key.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fire_always_notifies() {
        let set = ActiveAlertSet::new();
        let key = crate::alert_key("default", "nightly-backup", "JobFailed");
        let now = Utc::now();
        let decision = set.fire(&key, "JobFailed", "critical", "boom", chrono::Duration::hours(1), now);
        assert!(matches!(decision, FireDecision::FirstFire));
    }

    #[test]
    fn renotify_suppressed_within_window_then_fires_after() {
        let set = ActiveAlertSet::new();
        let key = crate::alert_key("default", "nightly-backup", "JobFailed");
        let t0 = Utc::now();
        set.fire(&key, "JobFailed", "critical", "boom", chrono::Duration::hours(1), t0);

        let t1 = t0 + chrono::Duration::minutes(10);
        let decision = set.fire(&key, "JobFailed", "critical", "boom again", chrono::Duration::hours(1), t1);
        assert!(matches!(decision, FireDecision::Suppressed));

        let t2 = t0 + chrono::Duration::hours(2);
        let decision = set.fire(&key, "JobFailed", "critical", "still broken", chrono::Duration::hours(1), t2);
        assert!(matches!(decision, FireDecision::Renotify));
    }

    #[test]
    fn clear_then_fire_is_treated_as_fresh_first_fire() {
        let set = ActiveAlertSet::new();
        let key = crate::alert_key("default", "nightly-backup", "JobFailed");
        let t0 = Utc::now();
        set.fire(&key, "JobFailed", "critical", "boom", chrono::Duration::hours(1), t0);
        set.clear(&key);

        let t1 = t0 + chrono::Duration::minutes(1);
        let decision = set.fire(&key, "JobFailed", "critical", "boom", chrono::Duration::hours(1), t1);
        assert!(matches!(decision, FireDecision::FirstFire));
    }
}
