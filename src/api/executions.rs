//! Execution history listing (paginated, status-filterable) and completed
//! job log retrieval (spec §6).

use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::store::{CronJobRef, Execution, ExecutionFilter, Page};

use super::error::ApiError;
use super::state::ApiState;

#[derive(Debug, Deserialize, Default)]
pub struct ListExecutionsQuery {
    pub succeeded: Option<bool>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_executions(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<Page<Execution>>, ApiError> {
    let cron_job_ref = CronJobRef { namespace, name };
    let filter = ExecutionFilter {
        since: None,
        succeeded: query.succeeded,
        offset: query.offset.unwrap_or(0),
        limit: query.limit.unwrap_or(50),
    };
    let page = state.store.get_executions_page(&cron_job_ref, filter).await?;
    Ok(Json(page))
}

#[derive(Serialize)]
pub struct JobLogsResponse {
    logs: String,
}

const MAX_LOG_FETCH_BYTES: usize = 256 * 1024;

pub async fn get_job_logs(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, job_name)): AxumPath<(String, String)>,
) -> Result<Json<JobLogsResponse>, ApiError> {
    let pod = state
        .platform
        .get_pod_for_job(&namespace, &job_name)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("no pod found for job {namespace}/{job_name}")))?;

    let pod_name = pod
        .metadata
        .name
        .ok_or_else(|| ApiError::internal("pod has no name"))?;

    let logs = state
        .platform
        .get_pod_logs(&namespace, &pod_name, MAX_LOG_FETCH_BYTES)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(JobLogsResponse { logs }))
}
