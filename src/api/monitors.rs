//! `CronJobMonitor` listing/detail endpoints (spec §6).

use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::Json;
use kube::api::{Api, ListParams};

use crate::crd::monitor::{CronJobMonitor, MonitorStatus};

use super::error::ApiError;
use super::state::ApiState;

pub async fn list_monitors(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<CronJobMonitor>>, ApiError> {
    let api: Api<CronJobMonitor> = Api::all(state.kube_client.clone());
    let list = api
        .list(&ListParams::default())
        .await
        .map_err(|e| ApiError::internal(format!("failed to list monitors: {e}")))?;
    Ok(Json(list.items))
}

pub async fn get_monitor(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<CronJobMonitor>, ApiError> {
    let api: Api<CronJobMonitor> = Api::namespaced(state.kube_client.clone(), &namespace);
    let monitor = api
        .get(&name)
        .await
        .map_err(|_| ApiError::not_found(format!("monitor {namespace}/{name} not found")))?;
    Ok(Json(monitor))
}

pub async fn get_monitor_status(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<MonitorStatus>, ApiError> {
    let Json(monitor) = get_monitor(State(state), AxumPath((namespace, name))).await?;
    Ok(Json(monitor.status.unwrap_or_default()))
}
