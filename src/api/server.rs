//! HTTP router wiring for the read/admin API (spec §6), under `/api/v1`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::state::ApiState;
use super::{admin, alerts, channels, cronjobs, executions, monitors};

/// Starts the read API's HTTP server. Returns the `JoinHandle` so the
/// caller can hold it for graceful shutdown, mirroring the metrics
/// server's own startup shape.
pub async fn start_api_server(
    bind: SocketAddr,
    state: Arc<ApiState>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let v1 = Router::new()
        .route("/stats", get(admin::stats))
        .route("/config", get(admin::effective_config))
        .route("/admin/prune", post(admin::prune))
        .route("/admin/storage-stats", get(admin::storage_stats))
        .route("/monitors", get(monitors::list_monitors))
        .route("/monitors/{namespace}/{name}", get(monitors::get_monitor))
        .route(
            "/monitors/{namespace}/{name}/status",
            get(monitors::get_monitor_status),
        )
        .route("/cronjobs", get(cronjobs::list_cron_jobs))
        .route("/cronjobs/{namespace}/{name}", get(cronjobs::get_cron_job))
        .route(
            "/cronjobs/{namespace}/{name}/suspend",
            post(cronjobs::suspend_cron_job),
        )
        .route(
            "/cronjobs/{namespace}/{name}/resume",
            post(cronjobs::resume_cron_job),
        )
        .route(
            "/cronjobs/{namespace}/{name}/trigger",
            post(cronjobs::trigger_cron_job),
        )
        .route(
            "/cronjobs/{namespace}/{name}/executions",
            get(executions::list_executions),
        )
        .route(
            "/jobs/{namespace}/{job_name}/logs",
            get(executions::get_job_logs),
        )
        .route(
            "/cronjobs/{namespace}/{name}/alerts",
            get(alerts::list_active_alerts),
        )
        .route(
            "/cronjobs/{namespace}/{name}/alerts/history",
            get(alerts::list_alert_history),
        )
        .route("/channels", get(channels::list_channels))
        .route("/channels/{namespace}/{name}", get(channels::get_channel))
        .route(
            "/channels/{namespace}/{name}/test",
            post(channels::test_channel),
        )
        .layer(
            TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!("http_request", path = %request.uri().path())
                },
            ),
        );

    // `/healthz` and `/readyz` are deliberately outside the traced `/api/v1`
    // nest so liveness/readiness polling does not spam request logs.
    let app = Router::new()
        .route("/healthz", get(admin::healthz))
        .route("/readyz", get(admin::readyz))
        .nest("/api/v1", v1)
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|error| anyhow::anyhow!("failed to bind API server to {bind}: {error}"))?;
    tracing::info!(%bind, "API server listening");

    let handle = tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            })
            .await
        {
            tracing::error!(%error, "API server exited with error");
        }
    });

    Ok(handle)
}
