//! Global metrics registry and metric handle definitions (spec §A.6).

use prometheus::{GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry};

use std::sync::LazyLock;

/// Global metrics instance. Initialized once, accessed from any call site.
static METRICS: LazyLock<Metrics> = LazyLock::new(Metrics::new);

/// All Prometheus metric handles for the guardian process.
///
/// Access via `Metrics::global()`. Metric handles are cheap to clone (Arc
/// internally) so call sites can grab references without threading state.
pub struct Metrics {
    pub(crate) registry: Registry,

    /// Total job-completion executions recorded.
    /// Labels: cronjob, namespace, status ("succeeded"/"failed").
    pub executions_total: IntCounterVec,

    /// Total alert sends that reached a channel successfully.
    /// Labels: channel, severity, type.
    pub alerts_sent_total: IntCounterVec,

    /// Total alert sends that a channel rejected or failed to deliver.
    /// Labels: channel, severity, type.
    pub alerts_failed_total: IntCounterVec,

    /// Current success rate over the analyzer's rolling window.
    /// Label: cronjob.
    pub success_rate_percent: GaugeVec,

    /// Current p50 execution duration in seconds.
    /// Label: cronjob.
    pub duration_p50_seconds: GaugeVec,

    /// Current p95 execution duration in seconds.
    /// Label: cronjob.
    pub duration_p95_seconds: GaugeVec,

    /// Current p99 execution duration in seconds.
    /// Label: cronjob.
    pub duration_p99_seconds: GaugeVec,

    /// Currently active alerts.
    /// Label: severity.
    pub active_alerts: IntGaugeVec,

    /// Total remediation actions attempted.
    /// Labels: action (kill_stuck_job/auto_retry), outcome.
    pub remediation_actions_total: IntCounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let executions_total = IntCounterVec::new(
            Opts::new("guardian_executions_total", "Total job executions recorded"),
            &["cronjob", "namespace", "status"],
        )
        .expect("hardcoded metric descriptor");

        let alerts_sent_total = IntCounterVec::new(
            Opts::new("guardian_alerts_sent_total", "Total alerts delivered to a channel"),
            &["channel", "severity", "type"],
        )
        .expect("hardcoded metric descriptor");

        let alerts_failed_total = IntCounterVec::new(
            Opts::new("guardian_alerts_failed_total", "Total alert deliveries a channel rejected"),
            &["channel", "severity", "type"],
        )
        .expect("hardcoded metric descriptor");

        let success_rate_percent = GaugeVec::new(
            Opts::new("guardian_success_rate_percent", "Success rate over the analyzer's rolling window"),
            &["cronjob"],
        )
        .expect("hardcoded metric descriptor");

        let duration_p50_seconds = GaugeVec::new(
            Opts::new("guardian_duration_p50_seconds", "p50 execution duration in seconds"),
            &["cronjob"],
        )
        .expect("hardcoded metric descriptor");

        let duration_p95_seconds = GaugeVec::new(
            Opts::new("guardian_duration_p95_seconds", "p95 execution duration in seconds"),
            &["cronjob"],
        )
        .expect("hardcoded metric descriptor");

        let duration_p99_seconds = GaugeVec::new(
            Opts::new("guardian_duration_p99_seconds", "p99 execution duration in seconds"),
            &["cronjob"],
        )
        .expect("hardcoded metric descriptor");

        let active_alerts = IntGaugeVec::new(
            Opts::new("guardian_active_alerts", "Currently active alerts"),
            &["severity"],
        )
        .expect("hardcoded metric descriptor");

        let remediation_actions_total = IntCounterVec::new(
            Opts::new("guardian_remediation_actions_total", "Total remediation actions attempted"),
            &["action", "outcome"],
        )
        .expect("hardcoded metric descriptor");

        registry.register(Box::new(executions_total.clone())).expect("hardcoded metric");
        registry.register(Box::new(alerts_sent_total.clone())).expect("hardcoded metric");
        registry.register(Box::new(alerts_failed_total.clone())).expect("hardcoded metric");
        registry.register(Box::new(success_rate_percent.clone())).expect("hardcoded metric");
        registry.register(Box::new(duration_p50_seconds.clone())).expect("hardcoded metric");
        registry.register(Box::new(duration_p95_seconds.clone())).expect("hardcoded metric");
        registry.register(Box::new(duration_p99_seconds.clone())).expect("hardcoded metric");
        registry.register(Box::new(active_alerts.clone())).expect("hardcoded metric");
        registry.register(Box::new(remediation_actions_total.clone())).expect("hardcoded metric");

        Self {
            registry,
            executions_total,
            alerts_sent_total,
            alerts_failed_total,
            success_rate_percent,
            duration_p50_seconds,
            duration_p95_seconds,
            duration_p99_seconds,
            active_alerts,
            remediation_actions_total,
        }
    }

    /// Access the global metrics instance.
    pub fn global() -> &'static Self {
        &METRICS
    }

    /// Updates the per-cronjob gauges from a freshly computed metrics snapshot.
    pub fn observe_cron_job_metrics(&self, cronjob: &str, metrics: &crate::store::Metrics) {
        self.success_rate_percent
            .with_label_values(&[cronjob])
            .set(metrics.success_rate);
        if let Some(p50) = metrics.p50_duration_secs {
            self.duration_p50_seconds.with_label_values(&[cronjob]).set(p50);
        }
        if let Some(p95) = metrics.p95_duration_secs {
            self.duration_p95_seconds.with_label_values(&[cronjob]).set(p95);
        }
        if let Some(p99) = metrics.p99_duration_secs {
            self.duration_p99_seconds.with_label_values(&[cronjob]).set(p99);
        }
    }
}
