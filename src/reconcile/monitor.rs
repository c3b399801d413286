//! Monitor reconciler (spec §4.8): per-`CronJobMonitor`, enumerate matching
//! cron jobs, refresh metrics/next-run/health, fire or clear alerts, and
//! publish the `status` subresource.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use kube::api::{Api, ListParams, Patch, PatchParams};

use crate::analyzer::SlaViolationKind;
use crate::crd::monitor::{
    CronJobHealthTag, CronJobMonitor, CronJobStatusEntry, MonitorPhase, MonitorStatus,
    MonitorSummary,
};
use crate::dispatcher::alert::Alert;
use crate::error::Result;
use crate::store::CronJobRef;

use super::ReconcileContext;

const SYSTEM_NAMESPACES: &[&str] = &["kube-system", "kube-public", "kube-node-lease"];

pub async fn run_once(ctx: &Arc<ReconcileContext>) -> Result<()> {
    let guardian_config = super::load_guardian_config(&ctx.kube_client).await;

    let api: Api<CronJobMonitor> = Api::all(ctx.kube_client.clone());
    let monitors = api
        .list(&ListParams::default())
        .await
        .map_err(|e| crate::error::PlatformError::Api(e.to_string()))?
        .items;

    for monitor in monitors {
        let namespace = monitor.metadata.namespace.clone().unwrap_or_default();
        let name = monitor.metadata.name.clone().unwrap_or_default();

        if is_ignored(&namespace, &guardian_config.ignored_namespaces) {
            continue;
        }

        if let Err(error) = reconcile_monitor(ctx, &namespace, &name, &monitor, &guardian_config.default_channels).await {
            tracing::warn!(%error, namespace = %namespace, monitor = %name, "monitor reconcile failed");
        }
    }

    Ok(())
}

fn is_ignored(namespace: &str, configured: &[String]) -> bool {
    SYSTEM_NAMESPACES.contains(&namespace) || configured.iter().any(|n| n == namespace)
}

async fn reconcile_monitor(
    ctx: &Arc<ReconcileContext>,
    namespace: &str,
    name: &str,
    monitor: &CronJobMonitor,
    default_channels: &[String],
) -> Result<()> {
    let cron_jobs = ctx.platform.list_cron_jobs(namespace).await?;
    let now = Utc::now();

    let mut entries = BTreeMap::new();
    let mut summary = MonitorSummary::default();

    for cron_job in &cron_jobs {
        let cj_name = cron_job.metadata.name.clone().unwrap_or_default();
        let labels = cron_job.metadata.labels.clone().unwrap_or_default();
        if !monitor.spec.selector.matches(&cj_name, &labels) {
            continue;
        }

        let cron_job_ref = CronJobRef {
            namespace: namespace.to_string(),
            name: cj_name.clone(),
        };

        let sla_window = monitor
            .spec
            .sla
            .as_ref()
            .and_then(|s| s.window_days)
            .unwrap_or(7);
        let metrics = ctx.analyzer.get_metrics(&cron_job_ref, sla_window).await?;

        let sla_result = ctx
            .analyzer
            .check_sla(&cron_job_ref, monitor.spec.sla.as_ref())
            .await?;

        let schedule_expr = cron_job.spec.as_ref().map(|s| s.schedule.as_str());
        let created = cron_job
            .metadata
            .creation_timestamp
            .clone()
            .map(|t| t.0)
            .unwrap_or(now);
        let dead_man_result = ctx
            .analyzer
            .check_dead_man_switch(
                &cron_job_ref,
                monitor.spec.dead_man_switch.as_ref(),
                schedule_expr,
                created,
                now,
            )
            .await?;

        let regression_result = ctx
            .analyzer
            .check_duration_regression(&cron_job_ref, monitor.spec.sla.as_ref())
            .await?;

        let suspended = cron_job
            .spec
            .as_ref()
            .and_then(|s| s.suspend)
            .unwrap_or(false);

        fire_or_clear(
            ctx,
            namespace,
            &cj_name,
            "SlaViolation",
            !sla_result.pass,
            || {
                format!(
                    "success rate {:.1}% below minimum {:.1}%",
                    sla_result.success_rate, sla_result.min_success_rate
                )
            },
            monitor.spec.alerting.as_ref(),
            default_channels,
            now,
        )
        .await;

        if sla_result.violations.contains(&SlaViolationKind::MaxDuration) {
            fire_or_clear(
                ctx,
                namespace,
                &cj_name,
                "MaxDurationExceeded",
                true,
                || "last run exceeded the configured max duration".to_string(),
                monitor.spec.alerting.as_ref(),
                default_channels,
                now,
            )
            .await;
        }

        fire_or_clear(
            ctx,
            namespace,
            &cj_name,
            "DeadManSwitch",
            dead_man_result.triggered,
            || dead_man_result.message.clone().unwrap_or_default(),
            monitor.spec.alerting.as_ref(),
            default_channels,
            now,
        )
        .await;

        fire_or_clear(
            ctx,
            namespace,
            &cj_name,
            "DurationRegression",
            regression_result.detected,
            || {
                format!(
                    "p95 duration regressed from {:.1}s to {:.1}s ({:+.1}%)",
                    regression_result.baseline_p95_secs.unwrap_or_default(),
                    regression_result.current_p95_secs.unwrap_or_default(),
                    regression_result.increase_percent.unwrap_or_default()
                )
            },
            monitor.spec.alerting.as_ref(),
            default_channels,
            now,
        )
        .await;

        let active_alerts = ctx.dispatcher.active_alerts_for(namespace, &cj_name);
        let active_alert_types: Vec<String> =
            active_alerts.iter().map(|a| a.alert_type.clone()).collect();
        let has_critical = active_alerts.iter().any(|a| a.severity == "critical");
        let has_any = !active_alerts.is_empty();

        let health = if suspended {
            CronJobHealthTag::Suspended
        } else if has_critical {
            CronJobHealthTag::Critical
        } else if has_any {
            CronJobHealthTag::Warning
        } else {
            CronJobHealthTag::Healthy
        };

        match health {
            CronJobHealthTag::Healthy => summary.healthy += 1,
            CronJobHealthTag::Warning => summary.warning += 1,
            CronJobHealthTag::Critical => summary.critical += 1,
            CronJobHealthTag::Suspended => summary.suspended += 1,
        }
        summary.total += 1;
        summary.active_alerts += active_alerts.len() as u32;

        let next_scheduled_time = schedule_expr
            .and_then(|expr| ctx.schedule_cache.next(expr, now).ok().flatten());

        let last_successful = ctx.store.get_last_successful_execution(&cron_job_ref).await?;

        entries.insert(
            cj_name.clone(),
            CronJobStatusEntry {
                namespace: namespace.to_string(),
                name: cj_name,
                status: health,
                success_rate: metrics.success_rate,
                runs_in_window: metrics.runs,
                p50_duration_secs: metrics.p50_duration_secs,
                p95_duration_secs: metrics.p95_duration_secs,
                p99_duration_secs: metrics.p99_duration_secs,
                last_successful_time: last_successful.and_then(|e| e.completion_time),
                next_scheduled_time,
                active_alerts: active_alert_types,
                last_remediation: None,
                missed_schedule_count: dead_man_result.missed_schedule_count,
            },
        );
    }

    let phase = if summary.critical > 0 {
        MonitorPhase::Degraded
    } else {
        MonitorPhase::Ready
    };

    let status = MonitorStatus {
        phase,
        cron_jobs: entries,
        summary,
        last_reconcile_time: Some(now),
        reason: None,
    };

    let api: Api<CronJobMonitor> = Api::namespaced(ctx.kube_client.clone(), namespace);
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| crate::error::PlatformError::Api(e.to_string()))?;

    Ok(())
}

/// Fires or clears one alert type for a cron job based on `should_fire`,
/// building the message lazily since most checks pass most of the time.
async fn fire_or_clear(
    ctx: &Arc<ReconcileContext>,
    namespace: &str,
    cron_job_name: &str,
    alert_type: &str,
    should_fire: bool,
    message: impl FnOnce() -> String,
    alerting_cfg: Option<&crate::crd::monitor::AlertingConfig>,
    default_channels: &[String],
    now: chrono::DateTime<Utc>,
) {
    let key = crate::alert_key(namespace, cron_job_name, alert_type);

    if should_fire {
        let message = message();
        let alert = Alert::new(
            namespace,
            cron_job_name,
            alert_type,
            "critical",
            format!("{cron_job_name}: {alert_type}"),
            message,
        );
        ctx.dispatcher
            .dispatch(alert, alerting_cfg, default_channels, now)
            .await
            .ok();
    } else {
        ctx.dispatcher.clear_alert(&key, now).await.ok();
    }
}
