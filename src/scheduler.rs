//! Background schedulers (spec §4.10): dead-man sweep, SLA recomputation,
//! history pruning. The startup grace period isn't a loop of its own — it's
//! a suppression window the dead-man sweep checks against `ctx.started_at`.

use std::sync::Arc;

use chrono::Utc;
use kube::api::{Api, ListParams};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::crd::monitor::CronJobMonitor;
use crate::dispatcher::alert::Alert;
use crate::error::Result;
use crate::reconcile::{run_periodic, ReconcileContext};
use crate::store::CronJobRef;
use crate::telemetry::Metrics;

pub fn spawn_dead_man_sweep_loop(
    ctx: Arc<ReconcileContext>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = ctx.settings.current().scheduler.dead_man_interval;
        run_periodic("dead_man_sweep", interval, shutdown_rx, || {
            dead_man_sweep(&ctx)
        })
        .await;
    })
}

async fn dead_man_sweep(ctx: &Arc<ReconcileContext>) -> Result<()> {
    let settings = ctx.settings.current();
    if ctx.started_at.elapsed() < settings.scheduler.startup_grace {
        return Ok(());
    }

    let guardian_config = crate::reconcile::load_guardian_config(&ctx.kube_client).await;
    let monitor_api: Api<CronJobMonitor> = Api::all(ctx.kube_client.clone());
    let monitors = monitor_api
        .list(&ListParams::default())
        .await
        .map_err(|e| crate::error::PlatformError::Api(e.to_string()))?
        .items;

    let now = Utc::now();

    for monitor in &monitors {
        let Some(dead_man_cfg) = monitor.spec.dead_man_switch.as_ref() else {
            continue;
        };
        if !dead_man_cfg.enabled {
            continue;
        }

        let namespace = monitor.metadata.namespace.clone().unwrap_or_default();
        if guardian_config.ignored_namespaces.iter().any(|n| n == &namespace) {
            continue;
        }

        let cron_jobs = match ctx.platform.list_cron_jobs(&namespace).await {
            Ok(jobs) => jobs,
            Err(error) => {
                tracing::warn!(%error, namespace = %namespace, "dead-man sweep: failed to list cron jobs");
                continue;
            }
        };

        for cron_job in &cron_jobs {
            let name = cron_job.metadata.name.clone().unwrap_or_default();
            let labels = cron_job.metadata.labels.clone().unwrap_or_default();
            if !monitor.spec.selector.matches(&name, &labels) {
                continue;
            }

            let cron_job_ref = CronJobRef {
                namespace: namespace.clone(),
                name: name.clone(),
            };
            let schedule_expr = cron_job.spec.as_ref().map(|s| s.schedule.as_str());
            let created = cron_job
                .metadata
                .creation_timestamp
                .clone()
                .map(|t| t.0)
                .unwrap_or(now);

            let result = ctx
                .analyzer
                .check_dead_man_switch(&cron_job_ref, Some(dead_man_cfg), schedule_expr, created, now)
                .await?;

            let key = crate::alert_key(&namespace, &name, "DeadManSwitch");
            if result.triggered {
                let alert = Alert::new(
                    &namespace,
                    &name,
                    "DeadManSwitch",
                    "critical",
                    format!("{name}: dead man switch triggered"),
                    result.message.unwrap_or_default(),
                );
                ctx.dispatcher
                    .dispatch(
                        alert,
                        monitor.spec.alerting.as_ref(),
                        &guardian_config.default_channels,
                        now,
                    )
                    .await
                    .ok();
            } else {
                ctx.dispatcher.clear_alert(&key, now).await.ok();
            }
        }
    }

    Ok(())
}

pub fn spawn_sla_recompute_loop(
    ctx: Arc<ReconcileContext>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = ctx.settings.current().scheduler.sla_recompute_interval;
        run_periodic("sla_recompute", interval, shutdown_rx, || {
            sla_recompute(&ctx)
        })
        .await;
    })
}

async fn sla_recompute(ctx: &Arc<ReconcileContext>) -> Result<()> {
    let monitor_api: Api<CronJobMonitor> = Api::all(ctx.kube_client.clone());
    let monitors = monitor_api
        .list(&ListParams::default())
        .await
        .map_err(|e| crate::error::PlatformError::Api(e.to_string()))?
        .items;

    for monitor in &monitors {
        let namespace = monitor.metadata.namespace.clone().unwrap_or_default();
        let window_days = monitor
            .spec
            .sla
            .as_ref()
            .and_then(|s| s.window_days)
            .unwrap_or(7);

        let cron_jobs = match ctx.platform.list_cron_jobs(&namespace).await {
            Ok(jobs) => jobs,
            Err(error) => {
                tracing::warn!(%error, namespace = %namespace, "sla recompute: failed to list cron jobs");
                continue;
            }
        };

        for cron_job in &cron_jobs {
            let name = cron_job.metadata.name.clone().unwrap_or_default();
            let labels = cron_job.metadata.labels.clone().unwrap_or_default();
            if !monitor.spec.selector.matches(&name, &labels) {
                continue;
            }

            let cron_job_ref = CronJobRef {
                namespace: namespace.clone(),
                name: name.clone(),
            };
            let metrics = ctx.analyzer.get_metrics(&cron_job_ref, window_days).await?;
            Metrics::global().observe_cron_job_metrics(&format!("{namespace}/{name}"), &metrics);
        }
    }

    Ok(())
}

pub fn spawn_prune_loop(
    ctx: Arc<ReconcileContext>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = ctx.settings.current().scheduler.prune_interval;
        run_periodic("prune", interval, shutdown_rx, || prune(&ctx)).await;
    })
}

async fn prune(ctx: &Arc<ReconcileContext>) -> Result<()> {
    let guardian_config = crate::reconcile::load_guardian_config(&ctx.kube_client).await;
    let settings = ctx.settings.current();

    let execution_days = guardian_config
        .history_retention
        .execution_days
        .min(settings.history_retention.max_days)
        .max(1);
    let before = Utc::now() - chrono::Duration::days(execution_days as i64);

    let rows_deleted = ctx.store.prune(before).await?;
    tracing::info!(rows_deleted, before = %before, "pruned execution/alert-history rows");
    Ok(())
}
