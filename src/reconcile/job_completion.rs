//! Job-completion handler (spec §4.6): turns a terminal `Job` into a durable
//! `Execution`, then fans success/failure out to every matching monitor.
//!
//! Poll-based like its siblings: each pass lists jobs fresh per namespace
//! rather than trusting a watch cache, so a process restart picks up
//! whatever completed while it was down without needing a resync cursor.

use std::sync::Arc;

use chrono::Utc;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, ListParams};

use crate::crd::monitor::{CronJobMonitor, RecreationPolicy};
use crate::dispatcher::alert::Alert;
use crate::dispatcher::suggested_fix::{self, FailureContext};
use crate::error::Result;
use crate::store::{CronJobRef, Execution};
use crate::telemetry::Metrics;

use super::{load_guardian_config, ReconcileContext};

pub async fn run_once(ctx: &Arc<ReconcileContext>) -> Result<()> {
    let monitor_api: Api<CronJobMonitor> = Api::all(ctx.kube_client.clone());
    let monitors = monitor_api
        .list(&ListParams::default())
        .await
        .map_err(|e| crate::error::PlatformError::Api(e.to_string()))?
        .items;

    let mut namespaces: Vec<String> = monitors
        .iter()
        .filter_map(|m| m.metadata.namespace.clone())
        .collect();
    namespaces.sort();
    namespaces.dedup();

    let guardian_config = load_guardian_config(&ctx.kube_client).await;

    for namespace in namespaces {
        let jobs = match ctx.platform.list_jobs(&namespace).await {
            Ok(jobs) => jobs,
            Err(error) => {
                tracing::warn!(%error, namespace = %namespace, "failed to list jobs");
                continue;
            }
        };

        let namespace_monitors: Vec<&CronJobMonitor> = monitors
            .iter()
            .filter(|m| m.metadata.namespace.as_deref() == Some(namespace.as_str()))
            .collect();

        for job in jobs {
            let job_name = job.metadata.name.clone().unwrap_or_default();
            if let Err(error) =
                process_job(ctx, &namespace_monitors, &guardian_config.default_channels, &job).await
            {
                tracing::warn!(%error, namespace = %namespace, job = %job_name, "job-completion processing failed");
            }
        }
    }

    Ok(())
}

async fn process_job(
    ctx: &Arc<ReconcileContext>,
    monitors: &[&CronJobMonitor],
    default_channels: &[String],
    job: &Job,
) -> Result<()> {
    let Some(owner) = ctx.platform.owning_cron_job(job).await else {
        return Ok(());
    };

    let status = job.status.as_ref();
    let completion_time = status.and_then(|s| s.completion_time.clone()).map(|t| t.0);
    let failed = status.and_then(|s| s.failed).unwrap_or(0);
    if completion_time.is_none() && failed == 0 {
        return Ok(()); // still running
    }

    let job_name = job.metadata.name.clone().unwrap_or_default();
    let cron_job_ref = CronJobRef {
        namespace: owner.namespace.clone(),
        name: owner.name.clone(),
    };

    if ctx.store.has_execution(&cron_job_ref, &job_name).await? {
        return Ok(());
    }

    let cron_job = ctx.platform.get_cron_job(&owner.namespace, &owner.name).await?;
    let cron_job_uid = cron_job
        .as_ref()
        .and_then(|cj| cj.metadata.uid.clone())
        .unwrap_or_default();
    let cron_job_labels = cron_job
        .as_ref()
        .and_then(|cj| cj.metadata.labels.clone())
        .unwrap_or_default();

    let mut matching: Vec<&CronJobMonitor> = monitors
        .iter()
        .filter(|m| m.spec.selector.matches(&owner.name, &cron_job_labels))
        .copied()
        .collect();
    matching.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

    // The first (lexicographically) matching monitor governs storage policy
    // when more than one monitor covers the same cron job.
    let storage_monitor = matching.first().copied();

    let existing_uids = ctx.store.get_cron_job_uids(&cron_job_ref).await?;
    let recreated = !cron_job_uid.is_empty()
        && !existing_uids.is_empty()
        && !existing_uids.contains(&cron_job_uid);
    if recreated {
        let on_recreation = storage_monitor
            .map(|m| m.spec.data_retention.on_recreation)
            .unwrap_or_default();
        if on_recreation == RecreationPolicy::Reset {
            for old_uid in &existing_uids {
                ctx.store.delete_executions_by_uid(&cron_job_ref, old_uid).await?;
            }
        }
    }

    let settings = ctx.settings.current();
    let capture_logs = storage_monitor.is_some_and(|m| m.spec.data_retention.store_logs)
        || settings.log_capture.store_logs;
    let capture_events = storage_monitor.is_some_and(|m| m.spec.data_retention.store_events)
        || settings.log_capture.store_events;
    let max_log_kb = storage_monitor
        .and_then(|m| m.spec.data_retention.max_log_size_kb)
        .unwrap_or(settings.log_capture.max_log_size_kb);

    let succeeded = status.and_then(|s| s.succeeded).unwrap_or(0) > 0 && failed == 0;

    let pod = ctx
        .platform
        .get_pod_for_job(&owner.namespace, &job_name)
        .await
        .ok()
        .flatten();
    let terminated = pod
        .as_ref()
        .and_then(|p| p.status.as_ref())
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|statuses| statuses.first())
        .and_then(|c| c.state.as_ref())
        .and_then(|s| s.terminated.as_ref());
    let exit_code = terminated.map(|t| t.exit_code).or(if succeeded { Some(0) } else { None });
    let termination_reason = terminated.and_then(|t| t.reason.clone());

    let start_time = status
        .and_then(|s| s.start_time.clone())
        .map(|t| t.0)
        .or_else(|| job.metadata.creation_timestamp.clone().map(|t| t.0))
        .unwrap_or_else(Utc::now);

    let labels = job.metadata.labels.clone().unwrap_or_default();
    let annotations = job.metadata.annotations.clone().unwrap_or_default();
    let retry = labels.get("retry").map(String::as_str) == Some("true");
    let retry_of = annotations.get("retry-of").cloned();

    let logs = if capture_logs {
        if let Some(pod) = &pod {
            let pod_name = pod.metadata.name.clone().unwrap_or_default();
            ctx.platform
                .get_pod_logs(&owner.namespace, &pod_name, max_log_kb as usize * 1024)
                .await
                .ok()
        } else {
            None
        }
    } else {
        None
    };

    let events = if capture_events {
        ctx.platform
            .list_events_for_object(&owner.namespace, &job_name, "Job")
            .await
            .ok()
            .map(|events| serde_json::to_value(events).unwrap_or(serde_json::Value::Null))
    } else {
        None
    };

    let execution = Execution {
        namespace: owner.namespace.clone(),
        cron_job_name: owner.name.clone(),
        cron_job_uid,
        job_name: job_name.clone(),
        start_time,
        completion_time,
        succeeded,
        exit_code,
        termination_reason: termination_reason.clone(),
        retry,
        retry_of,
        logs: logs.clone(),
        events: events.clone(),
    };

    ctx.store.record_execution(execution.clone()).await?;

    Metrics::global()
        .executions_total
        .with_label_values(&[
            &owner.name,
            &owner.namespace,
            if succeeded { "succeeded" } else { "failed" },
        ])
        .inc();

    let now = Utc::now();
    for monitor in &matching {
        if succeeded {
            ctx.remediation.reset_retry_count(&owner.namespace, &owner.name);
            let key = crate::alert_key(&owner.namespace, &owner.name, "JobFailed");
            ctx.dispatcher.clear_alert(&key, now).await.ok();
            continue;
        }

        let include = monitor
            .spec
            .alerting
            .as_ref()
            .map(|a| a.include_context.clone())
            .unwrap_or_default();

        let events_text = events.as_ref().map(|v| v.to_string());
        let fix_ctx = FailureContext {
            namespace: &owner.namespace,
            name: &owner.name,
            job_name: &job_name,
            exit_code,
            reason: termination_reason.as_deref(),
            logs: logs.as_deref(),
            events: events_text.as_deref(),
        };
        let suggested_fix = if include.suggested_fix {
            let patterns = monitor
                .spec
                .alerting
                .as_ref()
                .map(|a| suggested_fix::compile_patterns(&a.suggested_fix_patterns))
                .unwrap_or_default();
            suggested_fix::resolve(&fix_ctx, &patterns)
        } else {
            None
        };

        let mut alert = Alert::new(
            &owner.namespace,
            &owner.name,
            "JobFailed",
            "critical",
            format!("{} failed", owner.name),
            format!("job {job_name} failed"),
        );
        if include.exit_code {
            alert.context.exit_code = exit_code;
        }
        if include.reason {
            alert.context.reason = termination_reason.clone();
        }
        if include.suggested_fix {
            alert.context.suggested_fix = suggested_fix;
        }
        if include.logs {
            alert.context.logs = logs.clone();
        }
        if include.events {
            alert.context.events = events.as_ref().map(|v| v.to_string());
        }

        ctx.dispatcher
            .dispatch(alert, monitor.spec.alerting.as_ref(), default_channels, now)
            .await
            .ok();

        if let Some(remediation_cfg) = &monitor.spec.remediation {
            let (allowed, _reason) = ctx.remediation.can_remediate(&monitor.spec, &owner.namespace, now);
            if allowed {
                if let Some(retry_cfg) = &remediation_cfg.auto_retry {
                    let dry_run = settings.dry_run || remediation_cfg.dry_run;
                    ctx.remediation
                        .try_retry(&owner.namespace, &owner.name, &execution, retry_cfg, dry_run, now)
                        .await;
                }
            }
        }
    }

    Ok(())
}
