//! Execution / alert-history / channel-stats storage (spec §4.1).
//!
//! The core only depends on the [`Store`] trait; [`sqlite`] is the bundled
//! backend. Alternative backends implement the same trait against their own
//! schema.

pub mod sqlite;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use sqlite::SqliteStore;
pub use types::{
    AlertHistoryEntry, ChannelStats, CronJobRef, Execution, HealthStatus, Metrics, Percentile,
};

use crate::error::Result;
use crate::AlertKey;

/// Filter/pagination parameters for [`Store::get_executions_page`].
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub since: Option<DateTime<Utc>>,
    pub succeeded: Option<bool>,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// At-most-once per `(namespace, cron_job_name, job_name)`. Repeated
    /// calls with the same child-job identity are no-ops.
    async fn record_execution(&self, execution: Execution) -> Result<()>;

    /// True if an execution for this exact child job is already recorded —
    /// lets callers that poll for terminal jobs tell a fresh completion
    /// from one they've already processed across a process restart.
    async fn has_execution(&self, cron_job: &CronJobRef, job_name: &str) -> Result<bool>;

    async fn get_last_execution(&self, cron_job: &CronJobRef) -> Result<Option<Execution>>;

    async fn get_last_successful_execution(
        &self,
        cron_job: &CronJobRef,
    ) -> Result<Option<Execution>>;

    async fn get_executions(
        &self,
        cron_job: &CronJobRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<Execution>>;

    async fn get_executions_page(
        &self,
        cron_job: &CronJobRef,
        filter: ExecutionFilter,
    ) -> Result<Page<Execution>>;

    /// Percent in `[0, 100]`. Defaults to 100 when the window contains zero
    /// runs — silence reads as healthy; the dead-man switch is the separate
    /// signal for "nothing happened".
    async fn get_success_rate(&self, cron_job: &CronJobRef, window_days: u32) -> Result<f64>;

    async fn get_duration_percentile(
        &self,
        cron_job: &CronJobRef,
        pct: Percentile,
        window_days: u32,
    ) -> Result<Option<f64>>;

    async fn get_metrics(&self, cron_job: &CronJobRef, window_days: u32) -> Result<Metrics>;

    /// All distinct `cron_job_uid` values ever recorded for this name,
    /// newest first. Used to detect cron-job recreation.
    async fn get_cron_job_uids(&self, cron_job: &CronJobRef) -> Result<Vec<String>>;

    async fn delete_executions_by_uid(&self, cron_job: &CronJobRef, uid: &str) -> Result<u64>;

    async fn delete_executions_by_cron_job(&self, cron_job: &CronJobRef) -> Result<u64>;

    /// Deletes executions and resolved alert-history rows older than
    /// `before`. Returns the number of execution rows removed.
    async fn prune(&self, before: DateTime<Utc>) -> Result<u64>;

    async fn append_alert_history(&self, entry: AlertHistoryEntry) -> Result<()>;

    async fn query_alert_history(
        &self,
        cron_job: &CronJobRef,
        limit: i64,
    ) -> Result<Vec<AlertHistoryEntry>>;

    async fn resolve_alert_history(&self, key: &AlertKey, resolved_at: DateTime<Utc>)
        -> Result<()>;

    async fn save_channel_stats(&self, channel: &str, stats: ChannelStats) -> Result<()>;

    async fn load_channel_stats(&self, channel: &str) -> Result<ChannelStats>;

    async fn health(&self) -> Result<HealthStatus>;
}
