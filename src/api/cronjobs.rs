//! Cron-job listing/detail, manual trigger, and suspend/resume (spec §6).

use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::store::CronJobRef;

use super::error::ApiError;
use super::state::ApiState;

#[derive(Debug, Deserialize, Default)]
pub struct ListCronJobsQuery {
    pub namespace: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct CronJobSummary {
    namespace: String,
    name: String,
    suspended: bool,
    success_rate: f64,
    runs_in_window: u64,
}

pub async fn list_cron_jobs(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListCronJobsQuery>,
) -> Result<Json<Vec<CronJobSummary>>, ApiError> {
    let namespaces: Vec<String> = match &query.namespace {
        Some(ns) => vec![ns.clone()],
        None => vec!["".to_string()],
    };

    let mut summaries = Vec::new();
    for ns in namespaces {
        let cron_jobs = state
            .platform
            .list_cron_jobs(&ns)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;

        for cron_job in cron_jobs {
            let namespace = cron_job.metadata.namespace.clone().unwrap_or_default();
            let name = cron_job.metadata.name.clone().unwrap_or_default();

            if let Some(search) = &query.search {
                if !name.contains(search.as_str()) {
                    continue;
                }
            }

            let suspended = cron_job
                .spec
                .as_ref()
                .and_then(|s| s.suspend)
                .unwrap_or(false);

            if let Some(status) = &query.status {
                let tag = if suspended { "suspended" } else { "healthy" };
                if status != tag {
                    continue;
                }
            }

            let cron_job_ref = CronJobRef {
                namespace: namespace.clone(),
                name: name.clone(),
            };
            let metrics = state
                .store
                .get_metrics(&cron_job_ref, 7)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;

            summaries.push(CronJobSummary {
                namespace,
                name,
                suspended,
                success_rate: metrics.success_rate,
                runs_in_window: metrics.runs,
            });
        }
    }

    Ok(Json(summaries))
}

pub async fn get_cron_job(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<crate::store::Metrics>, ApiError> {
    let cron_job_ref = CronJobRef { namespace, name };
    let metrics = state.store.get_metrics(&cron_job_ref, 7).await?;
    Ok(Json(metrics))
}

#[derive(Serialize)]
pub struct SuspendResponse {
    suspended: bool,
}

pub async fn suspend_cron_job(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<SuspendResponse>, ApiError> {
    state
        .platform
        .set_cron_job_suspend(&namespace, &name, true)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(SuspendResponse { suspended: true }))
}

pub async fn resume_cron_job(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<SuspendResponse>, ApiError> {
    state
        .platform
        .set_cron_job_suspend(&namespace, &name, false)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(SuspendResponse { suspended: false }))
}

#[derive(Serialize)]
pub struct TriggerResponse {
    job_name: String,
}

/// Manually triggers a cron-job run by creating a job from its template,
/// outside the auto-retry path (spec §6's "trigger manual run").
pub async fn trigger_cron_job(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let generated_name = format!("{name}-manual-{}", uuid::Uuid::new_v4().simple());
    let generated_name = generated_name.chars().take(63).collect::<String>();

    let mut labels = std::collections::BTreeMap::new();
    labels.insert("cronjob".to_string(), name.clone());
    let mut annotations = std::collections::BTreeMap::new();
    annotations.insert("guardian.cronjobs.io/manual-trigger".to_string(), "true".to_string());

    let job = state
        .platform
        .create_job_from_template(&namespace, &name, &generated_name, labels, annotations)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(TriggerResponse {
        job_name: job.metadata.name.unwrap_or(generated_name),
    }))
}
