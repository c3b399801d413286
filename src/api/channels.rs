//! `AlertChannel` listing/detail + manual test-send endpoint (spec §6, §4.9).

use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::Json;
use kube::api::{Api, ListParams};
use serde::Serialize;

use crate::crd::channel::AlertChannel;

use super::error::ApiError;
use super::state::ApiState;

pub async fn list_channels(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<AlertChannel>>, ApiError> {
    let api: Api<AlertChannel> = Api::all(state.kube_client.clone());
    let list = api
        .list(&ListParams::default())
        .await
        .map_err(|e| ApiError::internal(format!("failed to list channels: {e}")))?;
    Ok(Json(list.items))
}

pub async fn get_channel(
    State(state): State<Arc<ApiState>>,
    AxumPath((namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<AlertChannel>, ApiError> {
    let api: Api<AlertChannel> = Api::namespaced(state.kube_client.clone(), &namespace);
    let channel = api
        .get(&name)
        .await
        .map_err(|_| ApiError::not_found(format!("channel {namespace}/{name} not found")))?;
    Ok(Json(channel))
}

#[derive(Serialize)]
pub struct TestChannelResponse {
    sent: bool,
}

/// Sends the channel's test payload through the already-registered live
/// handle (the channel reconciler registers one handle per `AlertChannel`
/// on every reconcile).
pub async fn test_channel(
    State(state): State<Arc<ApiState>>,
    AxumPath((_namespace, name)): AxumPath<(String, String)>,
) -> Result<Json<TestChannelResponse>, ApiError> {
    state.dispatcher.test_channel(&name).await?;
    Ok(Json(TestChannelResponse { sent: true }))
}
