//! Shared state injected into every API handler.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::analyzer::Analyzer;
use crate::config::SettingsHandle;
use crate::dispatcher::Dispatcher;
use crate::platform::PlatformClient;
use crate::remediation::RemediationEngine;
use crate::store::Store;

pub struct ApiState {
    pub store: Arc<dyn Store>,
    pub platform: Arc<dyn PlatformClient>,
    pub dispatcher: Arc<Dispatcher>,
    pub remediation: Arc<RemediationEngine>,
    pub analyzer: Arc<Analyzer>,
    pub kube_client: kube::Client,
    pub settings: Arc<SettingsHandle>,
    pub started_at: Instant,
    /// Flips true once the first full reconcile pass over every monitor has
    /// completed; gates `/readyz` (spec's supplemented probes).
    pub ready: Arc<AtomicBool>,
}
