//! Bounded self-healing: retry a failed run, kill a stuck run (spec §4.5).

pub mod maintenance;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::crd::monitor::{AutoRetryConfig, KillStuckConfig, MaintenanceWindow, MonitorSpec};
use crate::dispatcher::rate_limit::TokenBucket;
use crate::error::{RemediationError, Result};
use crate::platform::PlatformClient;
use crate::schedule::ScheduleCache;
use crate::store::Execution;

const DEFAULT_GLOBAL_RATE_PER_HOUR: u32 = 100;
const DEFAULT_GLOBAL_BURST: u32 = 10;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Outcome of a remediation attempt: distinguishes preconditions not being
/// met ("declined", non-fatal) from an actual execution error ("errored").
#[derive(Debug, Clone)]
pub enum Outcome {
    Success { detail: String },
    DryRun { detail: String },
    Declined { reason: String },
    Errored { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. } | Outcome::DryRun { .. })
    }
}

/// Tracks retry counts per cron job and enforces the global remediation
/// rate limit and 24h action counter (spec §4.5, §5).
pub struct RemediationEngine {
    platform: Arc<dyn PlatformClient>,
    schedule_cache: Arc<ScheduleCache>,
    retry_tracker: Mutex<HashMap<String, u32>>,
    global_bucket: TokenBucket,
    actions_24h: AtomicU64,
    dry_run: bool,
}

impl RemediationEngine {
    pub fn new(platform: Arc<dyn PlatformClient>, schedule_cache: Arc<ScheduleCache>) -> Self {
        Self::with_rate_limit(
            platform,
            schedule_cache,
            DEFAULT_GLOBAL_RATE_PER_HOUR,
            DEFAULT_GLOBAL_BURST,
            false,
        )
    }

    pub fn with_rate_limit(
        platform: Arc<dyn PlatformClient>,
        schedule_cache: Arc<ScheduleCache>,
        rate_per_hour: u32,
        burst: u32,
        global_dry_run: bool,
    ) -> Self {
        Self {
            platform,
            schedule_cache,
            retry_tracker: Mutex::new(HashMap::new()),
            global_bucket: TokenBucket::new(rate_per_hour, burst),
            actions_24h: AtomicU64::new(0),
            dry_run: global_dry_run,
        }
    }

    fn tracker_key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }

    fn is_dry_run(&self, spec: &MonitorSpec) -> bool {
        self.dry_run
            || spec
                .remediation
                .as_ref()
                .map(|r| r.dry_run)
                .unwrap_or(false)
    }

    /// Returns `(allowed, reason)`. Blocks on remediation being disabled or
    /// the current time falling inside a maintenance window. Dry-run mode
    /// is always allowed (operations simulate and don't mutate).
    pub fn can_remediate(
        &self,
        monitor: &MonitorSpec,
        namespace: &str,
        now: DateTime<Utc>,
    ) -> (bool, Option<String>) {
        let Some(remediation) = &monitor.remediation else {
            return (false, Some("remediation not configured".into()));
        };
        if !remediation.enabled {
            return (false, Some("remediation disabled".into()));
        }

        if maintenance::in_any_window(
            &monitor.maintenance_windows,
            monitor.timezone.as_deref(),
            now,
            &self.schedule_cache,
        ) {
            return (false, Some("inside a maintenance window".into()));
        }

        let _ = namespace;
        (true, None)
    }

    /// Preconditions: the job has started and `now - start >= after_duration`.
    pub async fn kill_stuck_job(
        &self,
        namespace: &str,
        job_name: &str,
        start_time: DateTime<Utc>,
        kill_cfg: &KillStuckConfig,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Outcome {
        if !kill_cfg.enabled {
            return Outcome::Declined {
                reason: "kill-stuck disabled".into(),
            };
        }

        let age = now - start_time;
        let threshold = chrono::Duration::from_std(kill_cfg.after_duration)
            .unwrap_or_else(|_| chrono::Duration::zero());
        if age < threshold {
            return Outcome::Declined {
                reason: format!(
                    "job has only been running {}s, threshold is {}s",
                    age.num_seconds(),
                    threshold.num_seconds()
                ),
            };
        }

        if dry_run {
            return Outcome::DryRun {
                detail: format!("would kill stuck job {namespace}/{job_name}"),
            };
        }

        if !self.global_bucket.try_acquire() {
            return Outcome::Errored {
                reason: "remediation rate limit exceeded".into(),
            };
        }

        match self
            .platform
            .delete_job(namespace, job_name, kill_cfg.propagation_policy)
            .await
        {
            Ok(()) => {
                self.actions_24h.fetch_add(1, Ordering::Relaxed);
                Outcome::Success {
                    detail: format!("killed stuck job {namespace}/{job_name}"),
                }
            }
            Err(e) => Outcome::Errored {
                reason: e.to_string(),
            },
        }
    }

    /// Preconditions: remediation enabled, auto-retry enabled, within
    /// `max_retries`, and (if set) the failed exit code is in
    /// `only_for_exit_codes`.
    pub async fn try_retry(
        &self,
        namespace: &str,
        cron_job_name: &str,
        failed_job: &Execution,
        retry_cfg: &AutoRetryConfig,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Outcome {
        if !retry_cfg.enabled {
            return Outcome::Declined {
                reason: "auto-retry disabled".into(),
            };
        }

        if !retry_cfg.only_for_exit_codes.is_empty() {
            let matches = failed_job
                .exit_code
                .is_some_and(|code| retry_cfg.only_for_exit_codes.contains(&code));
            if !matches {
                return Outcome::Declined {
                    reason: format!(
                        "exit code {:?} not in onlyForExitCodes",
                        failed_job.exit_code
                    ),
                };
            }
        }

        let key = Self::tracker_key(namespace, cron_job_name);
        let max_retries = retry_cfg.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let current = *self.retry_tracker.lock().unwrap().get(&key).unwrap_or(&0);
        if current >= max_retries {
            return Outcome::Declined {
                reason: format!("Max retries ({max_retries}) reached"),
            };
        }

        if dry_run {
            return Outcome::DryRun {
                detail: format!("would retry {namespace}/{cron_job_name} (attempt {})", current + 1),
            };
        }

        if !self.global_bucket.try_acquire() {
            return Outcome::Errored {
                reason: "remediation rate limit exceeded".into(),
            };
        }

        if let Some(delay) = retry_cfg.delay_between_retries {
            tokio::time::sleep(delay).await;
        }

        let attempt = current + 1;
        let mut generated_name = format!("{cron_job_name}-retry-{}-{attempt}", now.timestamp());
        generated_name.truncate(63);

        let mut labels = std::collections::BTreeMap::new();
        labels.insert("retry".to_string(), "true".to_string());
        labels.insert("cronjob".to_string(), cron_job_name.to_string());

        let mut annotations = std::collections::BTreeMap::new();
        annotations.insert("retry-of".to_string(), failed_job.job_name.clone());
        annotations.insert("retry-count".to_string(), attempt.to_string());

        match self
            .platform
            .create_job_from_template(namespace, cron_job_name, &generated_name, labels, annotations)
            .await
        {
            Ok(_job) => {
                *self.retry_tracker.lock().unwrap().entry(key).or_insert(0) = attempt;
                self.actions_24h.fetch_add(1, Ordering::Relaxed);
                Outcome::Success {
                    detail: format!("created retry job {generated_name}"),
                }
            }
            Err(e) => Outcome::Errored {
                reason: e.to_string(),
            },
        }
    }

    /// Called when a success is observed for the cron job.
    pub fn reset_retry_count(&self, namespace: &str, cron_job_name: &str) {
        let key = Self::tracker_key(namespace, cron_job_name);
        self.retry_tracker.lock().unwrap().insert(key, 0);
    }

    pub fn retry_count(&self, namespace: &str, cron_job_name: &str) -> u32 {
        let key = Self::tracker_key(namespace, cron_job_name);
        *self.retry_tracker.lock().unwrap().get(&key).unwrap_or(&0)
    }

    pub fn actions_24h(&self) -> u64 {
        self.actions_24h.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::monitor::{PropagationPolicy, RemediationConfig};
    use crate::platform::MockPlatformClient;

    fn engine() -> RemediationEngine {
        RemediationEngine::new(
            Arc::new(MockPlatformClient::new()),
            Arc::new(ScheduleCache::new()),
        )
    }

    fn sample_execution(exit_code: Option<i32>) -> Execution {
        Execution {
            namespace: "default".into(),
            cron_job_name: "nightly-backup".into(),
            cron_job_uid: "uid-1".into(),
            job_name: "nightly-backup-28".into(),
            start_time: Utc::now() - chrono::Duration::minutes(5),
            completion_time: Some(Utc::now()),
            succeeded: false,
            exit_code,
            termination_reason: Some("Error".into()),
            retry: false,
            retry_of: None,
            logs: None,
            events: None,
        }
    }

    #[tokio::test]
    async fn retry_bounded_at_max() {
        let engine = engine();
        let cfg = AutoRetryConfig {
            enabled: true,
            max_retries: Some(2),
            delay_between_retries: None,
            only_for_exit_codes: vec![],
        };

        let first = engine
            .try_retry("default", "nightly-backup", &sample_execution(Some(1)), &cfg, false, Utc::now())
            .await;
        assert!(first.is_success());

        let second = engine
            .try_retry("default", "nightly-backup", &sample_execution(Some(1)), &cfg, false, Utc::now())
            .await;
        assert!(second.is_success());

        let third = engine
            .try_retry("default", "nightly-backup", &sample_execution(Some(1)), &cfg, false, Utc::now())
            .await;
        match third {
            Outcome::Declined { reason } => assert!(reason.contains("Max retries (2) reached")),
            other => panic!("expected decline, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reset_retry_count_clears_tracker() {
        let engine = engine();
        let cfg = AutoRetryConfig {
            enabled: true,
            max_retries: Some(1),
            delay_between_retries: None,
            only_for_exit_codes: vec![],
        };
        engine
            .try_retry("default", "nightly-backup", &sample_execution(Some(1)), &cfg, false, Utc::now())
            .await;
        assert_eq!(engine.retry_count("default", "nightly-backup"), 1);

        engine.reset_retry_count("default", "nightly-backup");
        assert_eq!(engine.retry_count("default", "nightly-backup"), 0);
    }

    #[tokio::test]
    async fn only_for_exit_codes_filters_unmatched() {
        let engine = engine();
        let cfg = AutoRetryConfig {
            enabled: true,
            max_retries: Some(2),
            delay_between_retries: None,
            only_for_exit_codes: vec![137],
        };
        let outcome = engine
            .try_retry("default", "nightly-backup", &sample_execution(Some(1)), &cfg, false, Utc::now())
            .await;
        assert!(matches!(outcome, Outcome::Declined { .. }));
    }

    #[tokio::test]
    async fn dry_run_does_not_mutate_tracker() {
        let engine = engine();
        let cfg = AutoRetryConfig {
            enabled: true,
            max_retries: Some(2),
            delay_between_retries: None,
            only_for_exit_codes: vec![],
        };
        let outcome = engine
            .try_retry("default", "nightly-backup", &sample_execution(Some(1)), &cfg, true, Utc::now())
            .await;
        assert!(matches!(outcome, Outcome::DryRun { .. }));
        assert_eq!(engine.retry_count("default", "nightly-backup"), 0);
    }

    #[test]
    fn can_remediate_blocks_when_disabled() {
        let engine = engine();
        let spec = MonitorSpec {
            selector: Default::default(),
            dead_man_switch: None,
            sla: None,
            alerting: None,
            remediation: Some(RemediationConfig {
                enabled: false,
                dry_run: false,
                auto_retry: None,
                kill_stuck: None,
            }),
            data_retention: Default::default(),
            maintenance_windows: vec![],
            timezone: None,
        };
        let (allowed, reason) = engine.can_remediate(&spec, "default", Utc::now());
        assert!(!allowed);
        assert!(reason.is_some());
    }

    #[tokio::test]
    async fn kill_stuck_job_declines_before_threshold() {
        let engine = engine();
        let cfg = KillStuckConfig {
            enabled: true,
            after_duration: std::time::Duration::from_secs(3600),
            propagation_policy: PropagationPolicy::Foreground,
        };
        let now = Utc::now();
        let outcome = engine
            .kill_stuck_job("default", "job-1", now - chrono::Duration::minutes(5), &cfg, false, now)
            .await;
        assert!(matches!(outcome, Outcome::Declined { .. }));
    }
}
