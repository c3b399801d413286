//! Stateless façade over the store: SLA checks, dead-man-switch evaluation,
//! duration-regression detection (spec §4.3).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::crd::monitor::{DeadManSwitchConfig, SlaConfig};
use crate::error::Result;
use crate::store::{CronJobRef, Metrics, Percentile, Store};

const DEFAULT_SLA_WINDOW_DAYS: u32 = 7;
const DEFAULT_MIN_SUCCESS_RATE: f64 = 95.0;
const DEFAULT_REGRESSION_THRESHOLD_PERCENT: f64 = 50.0;
const DEFAULT_BASELINE_WINDOW_DAYS: u32 = 14;
const DEFAULT_RECENT_WINDOW_DAYS: u32 = 1;
const DEFAULT_DEAD_MAN_BUFFER: chrono::Duration = chrono::Duration::hours(1);
const DEFAULT_MISSED_SCHEDULE_THRESHOLD: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaViolationKind {
    SuccessRate,
    MaxDuration,
}

#[derive(Debug, Clone)]
pub struct SlaResult {
    pub pass: bool,
    pub success_rate: f64,
    pub min_success_rate: f64,
    pub violations: Vec<SlaViolationKind>,
}

#[derive(Debug, Clone)]
pub struct DeadManSwitchResult {
    pub triggered: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub expected_interval: Option<chrono::Duration>,
    pub time_since_success: Option<chrono::Duration>,
    pub missed_schedule_count: u32,
    pub should_increment_count: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DurationRegressionResult {
    pub detected: bool,
    pub baseline_p95_secs: Option<f64>,
    pub current_p95_secs: Option<f64>,
    pub increase_percent: Option<f64>,
}

/// Coarse human-readable rendering of a duration for alert messages, e.g.
/// `3h`, `90m`, `1d4h`. Not locale-aware; picks the coarsest unit that
/// doesn't round to zero.
fn humanize_duration(d: chrono::Duration) -> String {
    let total_secs = d.num_seconds().max(0);
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d{hours}h")
    } else if hours > 0 {
        format!("{hours}h")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{total_secs}s")
    }
}

pub struct Analyzer {
    store: Arc<dyn Store>,
    schedule_cache: Arc<crate::schedule::ScheduleCache>,
}

impl Analyzer {
    pub fn new(store: Arc<dyn Store>, schedule_cache: Arc<crate::schedule::ScheduleCache>) -> Self {
        Self {
            store,
            schedule_cache,
        }
    }

    pub async fn get_metrics(&self, cron_job: &CronJobRef, window_days: u32) -> Result<Metrics> {
        self.store.get_metrics(cron_job, window_days).await
    }

    pub async fn check_sla(&self, cron_job: &CronJobRef, cfg: Option<&SlaConfig>) -> Result<SlaResult> {
        let Some(cfg) = cfg else {
            return Ok(SlaResult {
                pass: true,
                success_rate: 100.0,
                min_success_rate: DEFAULT_MIN_SUCCESS_RATE,
                violations: Vec::new(),
            });
        };

        let window_days = cfg.window_days.unwrap_or(DEFAULT_SLA_WINDOW_DAYS);
        let min_success_rate = cfg.min_success_rate.unwrap_or(DEFAULT_MIN_SUCCESS_RATE);

        let success_rate = self.store.get_success_rate(cron_job, window_days).await?;
        let mut violations = Vec::new();
        if success_rate < min_success_rate {
            violations.push(SlaViolationKind::SuccessRate);
        }

        if let Some(max_duration) = cfg.max_duration {
            if let Some(last) = self.store.get_last_execution(cron_job).await? {
                if let Some(duration) = last.duration() {
                    if duration.to_std().unwrap_or_default() > max_duration {
                        violations.push(SlaViolationKind::MaxDuration);
                    }
                }
            }
        }

        Ok(SlaResult {
            pass: violations.is_empty(),
            success_rate,
            min_success_rate,
            violations,
        })
    }

    /// `schedule_expression` is the cron job's own schedule, needed only
    /// when `autoFromSchedule` is enabled — the analyzer has no other way
    /// to learn it, since it only ever looks at stored executions.
    pub async fn check_dead_man_switch(
        &self,
        cron_job: &CronJobRef,
        cfg: Option<&DeadManSwitchConfig>,
        schedule_expression: Option<&str>,
        cron_job_created: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<DeadManSwitchResult> {
        let not_triggered = DeadManSwitchResult {
            triggered: false,
            last_success: None,
            expected_interval: None,
            time_since_success: None,
            missed_schedule_count: 0,
            should_increment_count: false,
            message: None,
        };

        let Some(cfg) = cfg else {
            return Ok(not_triggered);
        };
        if !cfg.enabled {
            return Ok(not_triggered);
        }

        let last_execution = self.store.get_last_execution(cron_job).await?;
        let last_success = self.store.get_last_successful_execution(cron_job).await?;

        let expected_interval = match cfg.max_time_since_last_success {
            Some(explicit) => Some(
                chrono::Duration::from_std(explicit)
                    .unwrap_or_else(|_| chrono::Duration::zero()),
            ),
            None => match (&cfg.auto_from_schedule, schedule_expression) {
                (Some(auto), Some(expression)) if auto.enabled => {
                    let schedule = self.schedule_cache.schedule(expression).ok();
                    schedule.and_then(|schedule| {
                        let first = schedule.after(&now).next()?;
                        let second = schedule.after(&first).next()?;
                        let buffer = auto
                            .buffer
                            .and_then(|b| chrono::Duration::from_std(b).ok())
                            .unwrap_or(DEFAULT_DEAD_MAN_BUFFER);
                        Some((second - first) + buffer)
                    })
                }
                _ => None,
            },
        };

        let Some(expected_interval) = expected_interval else {
            return Ok(not_triggered);
        };

        let last_run_reference = last_execution
            .as_ref()
            .map(|e| e.completion_time.unwrap_or(e.start_time));

        // Elapsed time since the reference point (creation, when there has
        // never been a run; the last run otherwise), used both for the
        // missed-interval count and for the human-readable message below.
        let elapsed = match last_run_reference {
            None => now - cron_job_created,
            Some(reference) => now - reference,
        };
        // No-executions branch triggers at the boundary itself (`created +
        // expectedInterval <= now`); the has-run-before branch requires
        // strictly exceeding the interval, per spec §4.3.
        let past_threshold = if last_run_reference.is_none() {
            elapsed >= expected_interval
        } else {
            elapsed > expected_interval
        };
        let missed_count = if past_threshold {
            (elapsed.num_seconds() / expected_interval.num_seconds().max(1)) as u32
        } else {
            0
        };

        let threshold = cfg
            .auto_from_schedule
            .as_ref()
            .and_then(|a| a.missed_schedule_threshold)
            .unwrap_or(DEFAULT_MISSED_SCHEDULE_THRESHOLD);

        let triggered = missed_count >= threshold;
        let time_since_success = last_success.as_ref().map(|e| {
            now - e.completion_time.unwrap_or(e.start_time)
        });

        Ok(DeadManSwitchResult {
            triggered,
            last_success: last_success.and_then(|e| e.completion_time),
            expected_interval: Some(expected_interval),
            time_since_success,
            missed_schedule_count: missed_count,
            should_increment_count: triggered,
            message: triggered.then(|| {
                if last_run_reference.is_none() {
                    format!(
                        "no successful run observed since creation ({} ago, {missed_count} expected interval(s) missed, threshold {threshold})",
                        humanize_duration(elapsed)
                    )
                } else {
                    format!(
                        "no successful run observed in {} ({missed_count} expected interval(s) missed, threshold {threshold})",
                        humanize_duration(elapsed)
                    )
                }
            }),
        })
    }

    pub async fn check_duration_regression(
        &self,
        cron_job: &CronJobRef,
        cfg: Option<&SlaConfig>,
    ) -> Result<DurationRegressionResult> {
        let not_detected = DurationRegressionResult {
            detected: false,
            baseline_p95_secs: None,
            current_p95_secs: None,
            increase_percent: None,
        };

        let Some(cfg) = cfg else {
            return Ok(not_detected);
        };

        let threshold = cfg
            .duration_regression_threshold_percent
            .unwrap_or(DEFAULT_REGRESSION_THRESHOLD_PERCENT);
        let baseline_window_days = cfg
            .baseline_window_days
            .unwrap_or(DEFAULT_BASELINE_WINDOW_DAYS);

        let baseline = self
            .store
            .get_duration_percentile(cron_job, Percentile::P95, baseline_window_days)
            .await?;
        let current = self
            .store
            .get_duration_percentile(cron_job, Percentile::P95, DEFAULT_RECENT_WINDOW_DAYS)
            .await?;

        let (Some(baseline), Some(current)) = (baseline, current) else {
            return Ok(DurationRegressionResult {
                baseline_p95_secs: baseline,
                current_p95_secs: current,
                ..not_detected
            });
        };

        if baseline == 0.0 {
            return Ok(DurationRegressionResult {
                baseline_p95_secs: Some(baseline),
                current_p95_secs: Some(current),
                ..not_detected
            });
        }

        let increase = (current - baseline) / baseline * 100.0;
        let detected = current > baseline && increase >= threshold;

        Ok(DurationRegressionResult {
            detected,
            baseline_p95_secs: Some(baseline),
            current_p95_secs: Some(current),
            increase_percent: Some(increase),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::monitor::AutoFromScheduleConfig;
    use crate::store::{AlertHistoryEntry, ChannelStats, Execution, ExecutionFilter, HealthStatus, Page};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        success_rate: Mutex<f64>,
        last_execution: Mutex<Option<Execution>>,
        last_successful: Mutex<Option<Execution>>,
        p95_by_window: Mutex<std::collections::HashMap<u32, Option<f64>>>,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn record_execution(&self, _execution: Execution) -> Result<()> {
            Ok(())
        }
        async fn has_execution(&self, _cron_job: &CronJobRef, _job_name: &str) -> Result<bool> {
            Ok(false)
        }
        async fn get_last_execution(&self, _cron_job: &CronJobRef) -> Result<Option<Execution>> {
            Ok(self.last_execution.lock().unwrap().clone())
        }
        async fn get_last_successful_execution(
            &self,
            _cron_job: &CronJobRef,
        ) -> Result<Option<Execution>> {
            Ok(self.last_successful.lock().unwrap().clone())
        }
        async fn get_executions(
            &self,
            _cron_job: &CronJobRef,
            _since: DateTime<Utc>,
        ) -> Result<Vec<Execution>> {
            Ok(Vec::new())
        }
        async fn get_executions_page(
            &self,
            _cron_job: &CronJobRef,
            _filter: ExecutionFilter,
        ) -> Result<Page<Execution>> {
            Ok(Page {
                items: Vec::new(),
                total: 0,
            })
        }
        async fn get_success_rate(&self, _cron_job: &CronJobRef, _window_days: u32) -> Result<f64> {
            Ok(*self.success_rate.lock().unwrap())
        }
        async fn get_duration_percentile(
            &self,
            _cron_job: &CronJobRef,
            _pct: Percentile,
            window_days: u32,
        ) -> Result<Option<f64>> {
            Ok(self
                .p95_by_window
                .lock()
                .unwrap()
                .get(&window_days)
                .copied()
                .flatten())
        }
        async fn get_metrics(&self, _cron_job: &CronJobRef, _window_days: u32) -> Result<Metrics> {
            Ok(Metrics::default())
        }
        async fn get_cron_job_uids(&self, _cron_job: &CronJobRef) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete_executions_by_uid(&self, _cron_job: &CronJobRef, _uid: &str) -> Result<u64> {
            Ok(0)
        }
        async fn delete_executions_by_cron_job(&self, _cron_job: &CronJobRef) -> Result<u64> {
            Ok(0)
        }
        async fn prune(&self, _before: DateTime<Utc>) -> Result<u64> {
            Ok(0)
        }
        async fn append_alert_history(&self, _entry: AlertHistoryEntry) -> Result<()> {
            Ok(())
        }
        async fn query_alert_history(
            &self,
            _cron_job: &CronJobRef,
            _limit: i64,
        ) -> Result<Vec<AlertHistoryEntry>> {
            Ok(Vec::new())
        }
        async fn resolve_alert_history(
            &self,
            _key: &crate::AlertKey,
            _resolved_at: DateTime<Utc>,
        ) -> Result<()> {
            Ok(())
        }
        async fn save_channel_stats(&self, _channel: &str, _stats: ChannelStats) -> Result<()> {
            Ok(())
        }
        async fn load_channel_stats(&self, _channel: &str) -> Result<ChannelStats> {
            Ok(ChannelStats::default())
        }
        async fn health(&self) -> Result<HealthStatus> {
            Ok(HealthStatus { ok: true })
        }
    }

    fn cron_job() -> CronJobRef {
        CronJobRef {
            namespace: "default".into(),
            name: "nightly-backup".into(),
        }
    }

    #[tokio::test]
    async fn sla_absent_always_passes() {
        let store = Arc::new(FakeStore::default());
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let result = analyzer.check_sla(&cron_job(), None).await.unwrap();
        assert!(result.pass);
    }

    #[tokio::test]
    async fn sla_flags_success_rate_violation() {
        let store = Arc::new(FakeStore::default());
        *store.success_rate.lock().unwrap() = 80.0;
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let cfg = SlaConfig {
            window_days: Some(7),
            min_success_rate: Some(95.0),
            max_duration: None,
            duration_regression_threshold_percent: None,
            baseline_window_days: None,
        };
        let result = analyzer.check_sla(&cron_job(), Some(&cfg)).await.unwrap();
        assert!(!result.pass);
        assert_eq!(result.violations, vec![SlaViolationKind::SuccessRate]);
    }

    #[tokio::test]
    async fn dead_man_switch_not_triggered_when_disabled() {
        let store = Arc::new(FakeStore::default());
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let cfg = crate::crd::monitor::DeadManSwitchConfig {
            enabled: false,
            max_time_since_last_success: None,
            auto_from_schedule: None,
        };
        let now = Utc::now();
        let result = analyzer
            .check_dead_man_switch(&cron_job(), Some(&cfg), None, now, now)
            .await
            .unwrap();
        assert!(!result.triggered);
    }

    #[tokio::test]
    async fn dead_man_switch_triggers_past_explicit_threshold() {
        let store = Arc::new(FakeStore::default());
        let now = Utc::now();
        *store.last_execution.lock().unwrap() = Some(sample_execution(now - chrono::Duration::hours(5)));
        *store.last_successful.lock().unwrap() =
            Some(sample_execution(now - chrono::Duration::hours(5)));
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let cfg = crate::crd::monitor::DeadManSwitchConfig {
            enabled: true,
            max_time_since_last_success: Some(std::time::Duration::from_secs(3600)),
            auto_from_schedule: None,
        };
        let result = analyzer
            .check_dead_man_switch(
                &cron_job(),
                Some(&cfg),
                None,
                now - chrono::Duration::days(10),
                now,
            )
            .await
            .unwrap();
        assert!(result.triggered);
        assert!(result.missed_schedule_count >= 1);
    }

    #[tokio::test]
    async fn dead_man_switch_message_includes_elapsed_time() {
        // Scenario: hourly schedule, maxTimeSinceLastSuccess = 2h, last run 3h ago.
        let store = Arc::new(FakeStore::default());
        let now = Utc::now();
        *store.last_execution.lock().unwrap() = Some(sample_execution(now - chrono::Duration::hours(3)));
        *store.last_successful.lock().unwrap() =
            Some(sample_execution(now - chrono::Duration::hours(3)));
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let cfg = crate::crd::monitor::DeadManSwitchConfig {
            enabled: true,
            max_time_since_last_success: Some(std::time::Duration::from_secs(2 * 3600)),
            auto_from_schedule: None,
        };
        let result = analyzer
            .check_dead_man_switch(&cron_job(), Some(&cfg), None, now - chrono::Duration::days(10), now)
            .await
            .unwrap();
        assert!(result.triggered);
        assert!(result.missed_schedule_count >= 1);
        assert!(result.message.as_deref().unwrap().contains("3h"));
    }

    #[tokio::test]
    async fn dead_man_switch_no_executions_not_triggered_before_boundary() {
        let store = Arc::new(FakeStore::default());
        let now = Utc::now();
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let cfg = crate::crd::monitor::DeadManSwitchConfig {
            enabled: true,
            max_time_since_last_success: Some(std::time::Duration::from_secs(3600)),
            auto_from_schedule: None,
        };
        // created + expectedInterval > now -> not triggered.
        let created = now - chrono::Duration::minutes(59);
        let result = analyzer
            .check_dead_man_switch(&cron_job(), Some(&cfg), None, created, now)
            .await
            .unwrap();
        assert!(!result.triggered);
    }

    #[tokio::test]
    async fn dead_man_switch_no_executions_triggered_at_boundary_with_since_creation_message() {
        let store = Arc::new(FakeStore::default());
        let now = Utc::now();
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let cfg = crate::crd::monitor::DeadManSwitchConfig {
            enabled: true,
            max_time_since_last_success: Some(std::time::Duration::from_secs(3600)),
            auto_from_schedule: None,
        };
        // created + expectedInterval <= now (strictly at the boundary) -> triggered.
        let created = now - chrono::Duration::hours(1);
        let result = analyzer
            .check_dead_man_switch(&cron_job(), Some(&cfg), None, created, now)
            .await
            .unwrap();
        assert!(result.triggered);
        assert!(result.message.as_deref().unwrap().contains("since creation"));
    }

    #[tokio::test]
    async fn duration_regression_absent_config_not_detected() {
        let store = Arc::new(FakeStore::default());
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let result = analyzer
            .check_duration_regression(&cron_job(), None)
            .await
            .unwrap();
        assert!(!result.detected);
    }

    #[tokio::test]
    async fn duration_regression_detected_past_threshold() {
        let store = Arc::new(FakeStore::default());
        store
            .p95_by_window
            .lock()
            .unwrap()
            .insert(14, Some(100.0));
        store.p95_by_window.lock().unwrap().insert(1, Some(200.0));
        let analyzer = Analyzer::new(store, Arc::new(crate::schedule::ScheduleCache::new()));
        let cfg = SlaConfig {
            window_days: None,
            min_success_rate: None,
            max_duration: None,
            duration_regression_threshold_percent: Some(50.0),
            baseline_window_days: Some(14),
        };
        let result = analyzer
            .check_duration_regression(&cron_job(), Some(&cfg))
            .await
            .unwrap();
        assert!(result.detected);
        assert_eq!(result.increase_percent, Some(100.0));
    }

    fn sample_execution(completed_at: DateTime<Utc>) -> Execution {
        Execution {
            namespace: "default".into(),
            cron_job_name: "nightly-backup".into(),
            cron_job_uid: "uid-1".into(),
            job_name: "job-1".into(),
            start_time: completed_at - chrono::Duration::seconds(30),
            completion_time: Some(completed_at),
            succeeded: true,
            exit_code: Some(0),
            termination_reason: None,
            retry: false,
            retry_of: None,
            logs: None,
            events: None,
        }
    }
}
