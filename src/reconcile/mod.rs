//! Reconciliation loops: job-completion handling (§4.6), monitor status
//! computation (§4.8), and alert-channel registration (§4.9).
//!
//! All three are poll-based rather than `kube::runtime::Controller`-driven:
//! each pass lists the relevant objects fresh rather than trusting a watch
//! cache, which keeps the selector-matching and recreation-detection logic
//! (§4.6 step 5, step 6) honest about the platform's current state.

pub mod channel;
pub mod job_completion;
pub mod monitor;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::api::Api;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::analyzer::Analyzer;
use crate::config::SettingsHandle;
use crate::crd::guardian_config::{GuardianConfig, GuardianConfigSpec, SINGLETON_NAME};
use crate::dispatcher::Dispatcher;
use crate::platform::PlatformClient;
use crate::remediation::RemediationEngine;
use crate::schedule::ScheduleCache;
use crate::store::Store;

/// Shared handles every reconcile pass and background sweep reads from.
/// Constructed once in `main` and cloned (via `Arc`) into each spawned task.
pub struct ReconcileContext {
    pub store: Arc<dyn Store>,
    pub platform: Arc<dyn PlatformClient>,
    pub dispatcher: Arc<Dispatcher>,
    pub remediation: Arc<RemediationEngine>,
    pub analyzer: Arc<Analyzer>,
    pub schedule_cache: Arc<ScheduleCache>,
    pub kube_client: kube::Client,
    pub settings: Arc<SettingsHandle>,
    pub started_at: Instant,
    /// Flipped true once the monitor reconciler completes its first full
    /// pass, gating `/readyz`.
    pub ready: Arc<AtomicBool>,
}

/// Fetches the cluster-wide `GuardianConfig` singleton (named `default`),
/// falling back to all-defaults when it is absent — a fresh install has no
/// reason to require operators to create it before the operator runs.
pub async fn load_guardian_config(kube_client: &kube::Client) -> GuardianConfigSpec {
    let api: Api<GuardianConfig> = Api::all(kube_client.clone());
    match api.get(SINGLETON_NAME).await {
        Ok(config) => config.spec,
        Err(error) => {
            tracing::debug!(%error, "GuardianConfig singleton not found, using defaults");
            GuardianConfigSpec::default()
        }
    }
}

const JOB_COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(15);
const MONITOR_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);
const CHANNEL_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Runs `body` on `interval`, stopping as soon as the shutdown channel flips
/// true. Errors from a single pass are logged and swallowed so one bad pass
/// doesn't kill the loop — the next tick tries again.
pub(crate) async fn run_periodic<F, Fut>(
    label: &'static str,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut body: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<()>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = body().await {
                    tracing::warn!(%error, loop = label, "reconcile pass failed");
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::debug!(loop = label, "reconcile loop shutting down");
                    return;
                }
            }
        }
    }
}

pub fn spawn_job_completion_loop(
    ctx: Arc<ReconcileContext>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_periodic(
            "job_completion",
            JOB_COMPLETION_POLL_INTERVAL,
            shutdown_rx,
            || job_completion::run_once(&ctx),
        )
        .await;
    })
}

pub fn spawn_monitor_loop(
    ctx: Arc<ReconcileContext>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_periodic(
            "monitor",
            MONITOR_RECONCILE_INTERVAL,
            shutdown_rx,
            || async {
                let result = monitor::run_once(&ctx).await;
                ctx.ready.store(true, std::sync::atomic::Ordering::Relaxed);
                result
            },
        )
        .await;
    })
}

pub fn spawn_channel_loop(
    ctx: Arc<ReconcileContext>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_periodic(
            "channel",
            CHANNEL_RECONCILE_INTERVAL,
            shutdown_rx,
            || channel::run_once(&ctx),
        )
        .await;
    })
}
