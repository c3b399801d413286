//! SQLite-backed [`Store`] implementation.

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row as _, SqlitePool};

use super::{
    AlertHistoryEntry, ChannelStats, CronJobRef, Execution, ExecutionFilter, HealthStatus,
    Metrics, Page, Percentile, Store,
};
use crate::error::{Result, StoreError};
use crate::AlertKey;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS executions (
    namespace TEXT NOT NULL,
    cron_job_name TEXT NOT NULL,
    cron_job_uid TEXT NOT NULL,
    job_name TEXT NOT NULL,
    start_time TIMESTAMP NOT NULL,
    completion_time TIMESTAMP,
    succeeded INTEGER NOT NULL,
    exit_code INTEGER,
    termination_reason TEXT,
    retry INTEGER NOT NULL DEFAULT 0,
    retry_of TEXT,
    logs TEXT,
    events TEXT,
    PRIMARY KEY (namespace, cron_job_name, job_name)
);
CREATE INDEX IF NOT EXISTS idx_executions_lookup
    ON executions (namespace, cron_job_name, start_time DESC);

CREATE TABLE IF NOT EXISTS alert_history (
    key TEXT NOT NULL,
    namespace TEXT NOT NULL,
    cron_job_name TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    message TEXT NOT NULL,
    fired_at TIMESTAMP NOT NULL,
    resolved_at TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_alert_history_key ON alert_history (key, fired_at DESC);

CREATE TABLE IF NOT EXISTS channel_stats (
    channel TEXT PRIMARY KEY,
    alerts_sent_total INTEGER NOT NULL DEFAULT 0,
    alerts_failed_total INTEGER NOT NULL DEFAULT 0,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    last_failed_error TEXT,
    ready INTEGER NOT NULL DEFAULT 1
);
"#;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if absent) the SQLite database at `database_url` and
    /// applies the bundled schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(StoreError::from)?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    fn window_start(window_days: u32) -> DateTime<Utc> {
        Utc::now() - chrono::Duration::days(window_days as i64)
    }
}

fn execution_from_row(row: SqliteRow) -> Result<Execution> {
    let events_raw: Option<String> = row.try_get("events").ok();
    Ok(Execution {
        namespace: row
            .try_get("namespace")
            .context("failed to read execution namespace")?,
        cron_job_name: row
            .try_get("cron_job_name")
            .context("failed to read execution cron_job_name")?,
        cron_job_uid: row
            .try_get("cron_job_uid")
            .context("failed to read execution cron_job_uid")?,
        job_name: row
            .try_get("job_name")
            .context("failed to read execution job_name")?,
        start_time: row
            .try_get("start_time")
            .context("failed to read execution start_time")?,
        completion_time: row.try_get("completion_time").ok(),
        succeeded: row
            .try_get::<i64, _>("succeeded")
            .context("failed to read execution succeeded")?
            != 0,
        exit_code: row.try_get("exit_code").ok(),
        termination_reason: row.try_get("termination_reason").ok(),
        retry: row.try_get::<i64, _>("retry").unwrap_or(0) != 0,
        retry_of: row.try_get("retry_of").ok(),
        logs: row.try_get("logs").ok(),
        events: events_raw.and_then(|raw| serde_json::from_str(&raw).ok()),
    })
}

fn alert_history_from_row(row: SqliteRow) -> Result<AlertHistoryEntry> {
    let key: String = row
        .try_get("key")
        .context("failed to read alert_history key")?;
    Ok(AlertHistoryEntry {
        key: AlertKey::from(key.as_str()),
        namespace: row
            .try_get("namespace")
            .context("failed to read alert_history namespace")?,
        cron_job_name: row
            .try_get("cron_job_name")
            .context("failed to read alert_history cron_job_name")?,
        alert_type: row
            .try_get("alert_type")
            .context("failed to read alert_history alert_type")?,
        severity: row
            .try_get("severity")
            .context("failed to read alert_history severity")?,
        message: row
            .try_get("message")
            .context("failed to read alert_history message")?,
        fired_at: row
            .try_get("fired_at")
            .context("failed to read alert_history fired_at")?,
        resolved_at: row.try_get("resolved_at").ok(),
    })
}

/// Nearest-rank percentile over already-sorted ascending values.
fn percentile_of(sorted: &[f64], fraction: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = ((fraction * sorted.len() as f64).ceil() as usize)
        .max(1)
        .min(sorted.len());
    Some(sorted[rank - 1])
}

#[async_trait]
impl Store for SqliteStore {
    async fn record_execution(&self, execution: Execution) -> Result<()> {
        let events_json = execution
            .events
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO executions (
                namespace, cron_job_name, cron_job_uid, job_name, start_time,
                completion_time, succeeded, exit_code, termination_reason,
                retry, retry_of, logs, events
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (namespace, cron_job_name, job_name) DO NOTHING
            "#,
        )
        .bind(&execution.namespace)
        .bind(&execution.cron_job_name)
        .bind(&execution.cron_job_uid)
        .bind(&execution.job_name)
        .bind(execution.start_time)
        .bind(execution.completion_time)
        .bind(execution.succeeded as i64)
        .bind(execution.exit_code)
        .bind(&execution.termination_reason)
        .bind(execution.retry as i64)
        .bind(&execution.retry_of)
        .bind(&execution.logs)
        .bind(events_json)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn has_execution(&self, cron_job: &CronJobRef, job_name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM executions \
             WHERE namespace = ? AND cron_job_name = ? AND job_name = ?",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .bind(job_name)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(count > 0)
    }

    async fn get_last_execution(&self, cron_job: &CronJobRef) -> Result<Option<Execution>> {
        let row = sqlx::query(
            "SELECT * FROM executions WHERE namespace = ? AND cron_job_name = ? \
             ORDER BY start_time DESC LIMIT 1",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(execution_from_row).transpose()
    }

    async fn get_last_successful_execution(
        &self,
        cron_job: &CronJobRef,
    ) -> Result<Option<Execution>> {
        let row = sqlx::query(
            "SELECT * FROM executions WHERE namespace = ? AND cron_job_name = ? \
             AND succeeded = 1 ORDER BY start_time DESC LIMIT 1",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;

        row.map(execution_from_row).transpose()
    }

    async fn get_executions(
        &self,
        cron_job: &CronJobRef,
        since: DateTime<Utc>,
    ) -> Result<Vec<Execution>> {
        let rows = sqlx::query(
            "SELECT * FROM executions WHERE namespace = ? AND cron_job_name = ? \
             AND start_time >= ? ORDER BY start_time DESC",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter().map(execution_from_row).collect()
    }

    async fn get_executions_page(
        &self,
        cron_job: &CronJobRef,
        filter: ExecutionFilter,
    ) -> Result<Page<Execution>> {
        let mut query = String::from(
            "SELECT * FROM executions WHERE namespace = ? AND cron_job_name = ?",
        );
        let mut count_query =
            String::from("SELECT COUNT(*) FROM executions WHERE namespace = ? AND cron_job_name = ?");

        if filter.since.is_some() {
            query.push_str(" AND start_time >= ?");
            count_query.push_str(" AND start_time >= ?");
        }
        if filter.succeeded.is_some() {
            query.push_str(" AND succeeded = ?");
            count_query.push_str(" AND succeeded = ?");
        }
        query.push_str(" ORDER BY start_time DESC LIMIT ? OFFSET ?");

        let mut count_sql = sqlx::query_scalar(&count_query)
            .bind(&cron_job.namespace)
            .bind(&cron_job.name);
        if let Some(since) = filter.since {
            count_sql = count_sql.bind(since);
        }
        if let Some(succeeded) = filter.succeeded {
            count_sql = count_sql.bind(succeeded as i64);
        }
        let total: i64 = count_sql
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let mut sql = sqlx::query(&query)
            .bind(&cron_job.namespace)
            .bind(&cron_job.name);
        if let Some(since) = filter.since {
            sql = sql.bind(since);
        }
        if let Some(succeeded) = filter.succeeded {
            sql = sql.bind(succeeded as i64);
        }
        sql = sql.bind(filter.limit.clamp(1, 500)).bind(filter.offset.max(0));

        let rows = sql.fetch_all(&self.pool).await.map_err(StoreError::from)?;
        let items = rows
            .into_iter()
            .map(execution_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page { items, total })
    }

    async fn get_success_rate(&self, cron_job: &CronJobRef, window_days: u32) -> Result<f64> {
        let since = Self::window_start(window_days);
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(succeeded), 0) FROM executions \
             WHERE namespace = ? AND cron_job_name = ? AND start_time >= ?",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let (total, successes) = row;
        if total == 0 {
            return Ok(100.0);
        }
        Ok(successes as f64 / total as f64 * 100.0)
    }

    async fn get_duration_percentile(
        &self,
        cron_job: &CronJobRef,
        pct: Percentile,
        window_days: u32,
    ) -> Result<Option<f64>> {
        let durations = self.duration_samples(cron_job, window_days).await?;
        Ok(percentile_of(&durations, pct.fraction()))
    }

    async fn get_metrics(&self, cron_job: &CronJobRef, window_days: u32) -> Result<Metrics> {
        let since = Self::window_start(window_days);
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(succeeded), 0) FROM executions \
             WHERE namespace = ? AND cron_job_name = ? AND start_time >= ?",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;
        let (runs, successes) = row;
        let failures = runs - successes;
        let success_rate = if runs == 0 {
            100.0
        } else {
            successes as f64 / runs as f64 * 100.0
        };

        let durations = self.duration_samples(cron_job, window_days).await?;

        Ok(Metrics {
            runs: runs as u64,
            successes: successes as u64,
            failures: failures.max(0) as u64,
            success_rate,
            p50_duration_secs: percentile_of(&durations, Percentile::P50.fraction()),
            p95_duration_secs: percentile_of(&durations, Percentile::P95.fraction()),
            p99_duration_secs: percentile_of(&durations, Percentile::P99.fraction()),
        })
    }

    async fn get_cron_job_uids(&self, cron_job: &CronJobRef) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT cron_job_uid FROM executions \
             WHERE namespace = ? AND cron_job_name = ? ORDER BY start_time DESC",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(rows.into_iter().map(|(uid,)| uid).collect())
    }

    async fn delete_executions_by_uid(&self, cron_job: &CronJobRef, uid: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM executions WHERE namespace = ? AND cron_job_name = ? AND cron_job_uid = ?",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }

    async fn delete_executions_by_cron_job(&self, cron_job: &CronJobRef) -> Result<u64> {
        let result = sqlx::query("DELETE FROM executions WHERE namespace = ? AND cron_job_name = ?")
            .bind(&cron_job.namespace)
            .bind(&cron_job.name)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }

    async fn prune(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM executions WHERE start_time < ?")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        sqlx::query("DELETE FROM alert_history WHERE resolved_at IS NOT NULL AND resolved_at < ?")
            .bind(before)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }

    async fn append_alert_history(&self, entry: AlertHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_history (
                key, namespace, cron_job_name, alert_type, severity, message,
                fired_at, resolved_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&*entry.key)
        .bind(&entry.namespace)
        .bind(&entry.cron_job_name)
        .bind(&entry.alert_type)
        .bind(&entry.severity)
        .bind(&entry.message)
        .bind(entry.fired_at)
        .bind(entry.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn query_alert_history(
        &self,
        cron_job: &CronJobRef,
        limit: i64,
    ) -> Result<Vec<AlertHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM alert_history WHERE namespace = ? AND cron_job_name = ? \
             ORDER BY fired_at DESC LIMIT ?",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        rows.into_iter().map(alert_history_from_row).collect()
    }

    async fn resolve_alert_history(
        &self,
        key: &AlertKey,
        resolved_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE alert_history SET resolved_at = ? \
             WHERE key = ? AND resolved_at IS NULL",
        )
        .bind(resolved_at)
        .bind(&**key)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn save_channel_stats(&self, channel: &str, stats: ChannelStats) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_stats (
                channel, alerts_sent_total, alerts_failed_total,
                consecutive_failures, last_failed_error, ready
            )
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (channel) DO UPDATE SET
                alerts_sent_total = excluded.alerts_sent_total,
                alerts_failed_total = excluded.alerts_failed_total,
                consecutive_failures = excluded.consecutive_failures,
                last_failed_error = excluded.last_failed_error,
                ready = excluded.ready
            "#,
        )
        .bind(channel)
        .bind(stats.alerts_sent_total as i64)
        .bind(stats.alerts_failed_total as i64)
        .bind(stats.consecutive_failures as i64)
        .bind(&stats.last_failed_error)
        .bind(stats.ready as i64)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }

    async fn load_channel_stats(&self, channel: &str) -> Result<ChannelStats> {
        let row = sqlx::query("SELECT * FROM channel_stats WHERE channel = ?")
            .bind(channel)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let Some(row) = row else {
            return Ok(ChannelStats {
                ready: true,
                ..Default::default()
            });
        };

        Ok(ChannelStats {
            alerts_sent_total: row
                .try_get::<i64, _>("alerts_sent_total")
                .unwrap_or(0)
                .max(0) as u64,
            alerts_failed_total: row
                .try_get::<i64, _>("alerts_failed_total")
                .unwrap_or(0)
                .max(0) as u64,
            consecutive_failures: row
                .try_get::<i64, _>("consecutive_failures")
                .unwrap_or(0)
                .max(0) as u32,
            last_failed_error: row.try_get("last_failed_error").ok(),
            ready: row.try_get::<i64, _>("ready").unwrap_or(1) != 0,
        })
    }

    async fn health(&self) -> Result<HealthStatus> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(HealthStatus { ok: true })
    }
}

impl SqliteStore {
    async fn duration_samples(&self, cron_job: &CronJobRef, window_days: u32) -> Result<Vec<f64>> {
        let since = Self::window_start(window_days);
        let rows: Vec<(DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT start_time, completion_time FROM executions \
             WHERE namespace = ? AND cron_job_name = ? AND start_time >= ? \
             AND completion_time IS NOT NULL",
        )
        .bind(&cron_job.namespace)
        .bind(&cron_job.name)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        let mut durations: Vec<f64> = rows
            .into_iter()
            .map(|(start, end)| (end - start).num_milliseconds() as f64 / 1000.0)
            .collect();
        durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Ok(durations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite should connect");
        let store = SqliteStore::new(pool);
        store.migrate().await.expect("schema should apply");
        store
    }

    fn sample_execution(job_name: &str, succeeded: bool, duration_secs: i64) -> Execution {
        let start = Utc::now() - chrono::Duration::hours(1);
        Execution {
            namespace: "default".into(),
            cron_job_name: "nightly-backup".into(),
            cron_job_uid: "uid-1".into(),
            job_name: job_name.into(),
            start_time: start,
            completion_time: Some(start + chrono::Duration::seconds(duration_secs)),
            succeeded,
            exit_code: Some(if succeeded { 0 } else { 1 }),
            termination_reason: None,
            retry: false,
            retry_of: None,
            logs: None,
            events: None,
        }
    }

    #[tokio::test]
    async fn record_execution_is_idempotent_by_child_job_identity() {
        let store = setup_store().await;
        let cron_job = CronJobRef {
            namespace: "default".into(),
            name: "nightly-backup".into(),
        };

        store
            .record_execution(sample_execution("nightly-backup-28", true, 30))
            .await
            .unwrap();
        store
            .record_execution(sample_execution("nightly-backup-28", false, 99))
            .await
            .unwrap();

        let executions = store
            .get_executions(&cron_job, Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);
        assert!(executions[0].succeeded, "first insert should win");
    }

    #[tokio::test]
    async fn has_execution_reflects_recorded_child_jobs_only() {
        let store = setup_store().await;
        let cron_job = CronJobRef {
            namespace: "default".into(),
            name: "nightly-backup".into(),
        };
        assert!(!store.has_execution(&cron_job, "nightly-backup-28").await.unwrap());

        store
            .record_execution(sample_execution("nightly-backup-28", true, 30))
            .await
            .unwrap();

        assert!(store.has_execution(&cron_job, "nightly-backup-28").await.unwrap());
        assert!(!store.has_execution(&cron_job, "nightly-backup-29").await.unwrap());
    }

    #[tokio::test]
    async fn success_rate_defaults_to_100_with_no_runs() {
        let store = setup_store().await;
        let cron_job = CronJobRef {
            namespace: "default".into(),
            name: "never-run".into(),
        };
        let rate = store.get_success_rate(&cron_job, 7).await.unwrap();
        assert_eq!(rate, 100.0);
    }

    #[tokio::test]
    async fn success_rate_reflects_recorded_runs() {
        let store = setup_store().await;
        let cron_job = CronJobRef {
            namespace: "default".into(),
            name: "nightly-backup".into(),
        };
        store
            .record_execution(sample_execution("job-1", true, 10))
            .await
            .unwrap();
        store
            .record_execution(sample_execution("job-2", false, 10))
            .await
            .unwrap();
        store
            .record_execution(sample_execution("job-3", true, 10))
            .await
            .unwrap();

        let rate = store.get_success_rate(&cron_job, 7).await.unwrap();
        assert!((rate - 66.666).abs() < 0.01);
    }

    #[tokio::test]
    async fn duration_percentiles_over_window() {
        let store = setup_store().await;
        let cron_job = CronJobRef {
            namespace: "default".into(),
            name: "nightly-backup".into(),
        };
        for (i, secs) in [10, 20, 30, 40, 100].into_iter().enumerate() {
            store
                .record_execution(sample_execution(&format!("job-{i}"), true, secs))
                .await
                .unwrap();
        }

        let p50 = store
            .get_duration_percentile(&cron_job, Percentile::P50, 7)
            .await
            .unwrap();
        assert_eq!(p50, Some(30.0));
    }

    #[tokio::test]
    async fn recreation_cleanup_scopes_to_old_uid_only() {
        let store = setup_store().await;
        let cron_job = CronJobRef {
            namespace: "default".into(),
            name: "nightly-backup".into(),
        };

        let mut old = sample_execution("job-old", true, 10);
        old.cron_job_uid = "uid-old".into();
        store.record_execution(old).await.unwrap();

        let mut fresh = sample_execution("job-new", true, 10);
        fresh.cron_job_uid = "uid-new".into();
        store.record_execution(fresh).await.unwrap();

        let deleted = store
            .delete_executions_by_uid(&cron_job, "uid-old")
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = store
            .get_executions(&cron_job, Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].cron_job_uid, "uid-new");
    }

    #[tokio::test]
    async fn channel_stats_round_trip_defaults_ready_when_absent() {
        let store = setup_store().await;
        let stats = store.load_channel_stats("slack-oncall").await.unwrap();
        assert!(stats.ready);
        assert_eq!(stats.alerts_sent_total, 0);

        store
            .save_channel_stats(
                "slack-oncall",
                ChannelStats {
                    alerts_sent_total: 5,
                    consecutive_failures: 2,
                    ready: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let reloaded = store.load_channel_stats("slack-oncall").await.unwrap();
        assert_eq!(reloaded.alerts_sent_total, 5);
        assert!(!reloaded.ready);
    }
}
