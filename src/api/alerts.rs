//! Active and historical alert listing (spec §6).

use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::dispatcher::ActiveAlert;
use crate::store::{AlertHistoryEntry, CronJobRef};

use super::error::ApiError;
use super::state::ApiState;

pub async fn list_active_alerts(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Json<Vec<ActiveAlert>> {
    Json(state.dispatcher.active_alerts_for(&namespace, &name))
}

#[derive(Debug, Deserialize, Default)]
pub struct AlertHistoryQuery {
    pub limit: Option<i64>,
}

pub async fn list_alert_history(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
    Query(query): Query<AlertHistoryQuery>,
) -> Result<Json<Vec<AlertHistoryEntry>>, ApiError> {
    let cron_job_ref = CronJobRef { namespace, name };
    let history = state
        .store
        .query_alert_history(&cron_job_ref, query.limit.unwrap_or(100))
        .await?;
    Ok(Json(history))
}
