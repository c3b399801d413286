//! cronjob-guardian entry point.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::Parser;
use cronjob_guardian::analyzer::Analyzer;
use cronjob_guardian::config::{CliOverrides, GuardianSettings, SettingsHandle};
use cronjob_guardian::dispatcher::{Dispatcher, GlobalRateLimit};
use cronjob_guardian::platform::{KubeClient, PlatformClient};
use cronjob_guardian::remediation::RemediationEngine;
use cronjob_guardian::schedule::ScheduleCache;
use cronjob_guardian::store::{SqliteStore, Store};
use cronjob_guardian::{api, crd, reconcile, scheduler, telemetry};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::Layer as _;

#[derive(Parser)]
#[command(name = "guardian", version)]
#[command(about = "Kubernetes CronJob monitoring, alerting, and bounded remediation")]
struct Cli {
    /// Path to config file (optional; defaults to ./guardian.{yaml,toml} if present)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Enable leader-election gating for mutating loops
    #[arg(long)]
    leader_elect: bool,

    /// Override the metrics server port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Override the log level (trace/debug/info/warn/error)
    #[arg(long)]
    log_level: Option<String>,

    /// Run remediation actions as no-ops, logging what would have happened
    #[arg(long)]
    dry_run: bool,

    /// Print the operator's CustomResourceDefinitions as YAML and exit
    #[arg(long)]
    print_crds: bool,
}

fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let cli = Cli::parse();

    if cli.print_crds {
        for crd in crd::all() {
            println!("{}", serde_yaml::to_string(&crd)?);
            println!("---");
        }
        return Ok(());
    }

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        leader_elect: cli.leader_elect.then_some(true),
        metrics_port: cli.metrics_port,
        log_level: cli.log_level.clone(),
        dry_run: cli.dry_run,
    };

    let settings = GuardianSettings::load(&overrides).context("failed to load configuration")?;

    // The Tokio runtime is built explicitly (rather than via `#[tokio::main]`)
    // because tracing init happens inside `block_on`: the OTLP batch exporter
    // calls `tokio::spawn` at construction time and needs an active handle.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")?;

    runtime.block_on(async {
        let otel_provider = init_tracing(&settings.log);
        let result = run(settings, overrides).await;

        if let Some(provider) = otel_provider {
            let _ = provider.shutdown();
        }
        result
    })
}

fn init_tracing(
    log: &cronjob_guardian::config::LogConfig,
) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log.level.clone()));

    let fmt_layer = tracing_subscriber::fmt::layer();
    let fmt_layer = match log.format {
        cronjob_guardian::config::LogFormat::Json => fmt_layer.json().boxed(),
        cronjob_guardian::config::LogFormat::Text => fmt_layer.boxed(),
    };

    match build_otlp_provider() {
        Some(provider) => {
            let tracer = {
                use opentelemetry::trace::TracerProvider as _;
                provider.tracer("cronjob-guardian")
            };
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .init();
            Some(provider)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).init();
            None
        }
    }
}

use tracing_subscriber::Layer as _;

/// Builds an OTLP trace exporter when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
/// Absent that environment variable, tracing runs with the fmt layer alone.
fn build_otlp_provider() -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    use opentelemetry_otlp::WithExportConfig as _;

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|error| tracing::warn!(%error, "failed to build OTLP exporter"))
        .ok()?;

    Some(
        opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .build(),
    )
}

async fn run(settings: GuardianSettings, overrides: CliOverrides) -> anyhow::Result<()> {
    tracing::info!("starting cronjob-guardian");

    let kube_client = kube::Client::try_default()
        .await
        .context("failed to build Kubernetes client")?;
    let platform: Arc<dyn PlatformClient> = Arc::new(KubeClient::new(kube_client.clone()));

    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::connect(&settings.storage.dsn)
            .await
            .context("failed to connect to store")?,
    );

    let schedule_cache = Arc::new(ScheduleCache::new());
    let analyzer = Arc::new(Analyzer::new(store.clone(), schedule_cache.clone()));

    let dispatcher = Arc::new(Dispatcher::with_global_rate_limit(
        store.clone(),
        GlobalRateLimit {
            max_alerts_per_hour: settings.rate_limits.max_alerts_per_hour,
            burst_limit: settings.rate_limits.alert_burst_limit,
        },
    ));

    let remediation = Arc::new(RemediationEngine::with_rate_limit(
        platform.clone(),
        schedule_cache.clone(),
        settings.rate_limits.max_remediations_per_hour,
        settings.rate_limits.remediation_burst_limit,
        settings.dry_run,
    ));

    let settings_handle = Arc::new(SettingsHandle::new(settings, overrides.clone()));
    if let Some(path) = &overrides.config_path {
        settings_handle.watch_file(path);
    }

    let ready = Arc::new(AtomicBool::new(false));
    let started_at = Instant::now();

    let ctx = Arc::new(reconcile::ReconcileContext {
        store: store.clone(),
        platform: platform.clone(),
        dispatcher: dispatcher.clone(),
        remediation: remediation.clone(),
        analyzer: analyzer.clone(),
        schedule_cache: schedule_cache.clone(),
        kube_client: kube_client.clone(),
        settings: settings_handle.clone(),
        started_at,
        ready: ready.clone(),
    });

    let api_state = Arc::new(api::state::ApiState {
        store: store.clone(),
        platform: platform.clone(),
        dispatcher: dispatcher.clone(),
        remediation: remediation.clone(),
        analyzer: analyzer.clone(),
        kube_client: kube_client.clone(),
        settings: settings_handle.clone(),
        started_at,
        ready: ready.clone(),
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut handles = vec![
        reconcile::spawn_job_completion_loop(ctx.clone(), shutdown_rx.clone()),
        reconcile::spawn_monitor_loop(ctx.clone(), shutdown_rx.clone()),
        reconcile::spawn_channel_loop(ctx.clone(), shutdown_rx.clone()),
        scheduler::spawn_dead_man_sweep_loop(ctx.clone(), shutdown_rx.clone()),
        scheduler::spawn_sla_recompute_loop(ctx.clone(), shutdown_rx.clone()),
        scheduler::spawn_prune_loop(ctx.clone(), shutdown_rx.clone()),
    ];

    let api_bind: SocketAddr = format!(
        "{}:{}",
        settings_handle.current().server.api.bind,
        settings_handle.current().server.api.port
    )
    .parse()
    .context("invalid API bind address")?;
    handles.push(api::start_api_server(api_bind, api_state, shutdown_rx.clone()).await?);

    let metrics_bind: SocketAddr = format!(
        "{}:{}",
        settings_handle.current().server.metrics.bind,
        settings_handle.current().server.metrics.port
    )
    .parse()
    .context("invalid metrics bind address")?;
    handles.push(telemetry::start_metrics_server(metrics_bind, shutdown_rx.clone()).await?);

    tracing::info!("cronjob-guardian started");

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    if tokio::time::timeout(Duration::from_secs(10), futures::future::join_all(handles))
        .await
        .is_err()
    {
        tracing::warn!("graceful shutdown timed out after 10s, exiting anyway");
    }

    tracing::info!("cronjob-guardian stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
