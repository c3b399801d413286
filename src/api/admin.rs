//! Health/readiness probes, effective-config dump, and admin actions
//! (prune, storage stats) — spec §6.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::error::ApiError;
use super::state::ApiState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn readyz(State(state): State<Arc<ApiState>>) -> Result<Json<HealthResponse>, ApiError> {
    if !state.ready.load(Ordering::SeqCst) {
        return Err(ApiError::service_unavailable("initial reconcile pass not yet complete"));
    }
    state
        .store
        .health()
        .await
        .map_err(|_| ApiError::service_unavailable("store is unreachable"))?;
    Ok(Json(HealthResponse { status: "ready" }))
}

#[derive(Serialize)]
pub struct StatsResponse {
    uptime_seconds: u64,
    channels_registered: usize,
    alerts_dispatched_24h: usize,
    remediation_actions_24h: u64,
}

pub async fn stats(State(state): State<Arc<ApiState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.started_at.elapsed().as_secs(),
        channels_registered: state.dispatcher.channel_names().len(),
        alerts_dispatched_24h: state.dispatcher.get_alert_count_24h(),
        remediation_actions_24h: state.remediation.actions_24h(),
    })
}

/// The process's currently effective (post-layering, post-hot-reload)
/// configuration, for operator debugging.
pub async fn effective_config(
    State(state): State<Arc<ApiState>>,
) -> Json<crate::config::GuardianSettings> {
    Json((*state.settings.current()).clone())
}

#[derive(Serialize)]
pub struct PruneResponse {
    rows_deleted: u64,
}

pub async fn prune(State(state): State<Arc<ApiState>>) -> Result<Json<PruneResponse>, ApiError> {
    let retention = state.settings.current().history_retention;
    let before = chrono::Utc::now() - chrono::Duration::days(retention.default_days as i64);
    let rows_deleted = state.store.prune(before).await?;
    Ok(Json(PruneResponse { rows_deleted }))
}

#[derive(Serialize)]
pub struct StorageStatsResponse {
    backend: String,
    dsn: String,
}

pub async fn storage_stats(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<StorageStatsResponse>, ApiError> {
    state.store.health().await?;
    let storage = state.settings.current().storage.clone();
    Ok(Json(StorageStatsResponse {
        backend: storage.backend,
        dsn: storage.dsn,
    }))
}
