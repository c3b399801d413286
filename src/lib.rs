//! cronjob-guardian: a cluster-side operator that watches scheduled batch
//! workloads, records executions, evaluates health/SLA, dispatches alerts,
//! and performs bounded self-healing remediation.

pub mod analyzer;
pub mod api;
pub mod config;
pub mod crd;
pub mod dispatcher;
pub mod error;
pub mod platform;
pub mod reconcile;
pub mod remediation;
pub mod schedule;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod telemetry;

pub use error::{Error, Result};

use std::sync::Arc;

/// Stable identity of an active alert: `<namespace>/<cronjob>/<type>`.
pub type AlertKey = Arc<str>;

/// Build an alert key from its three components.
pub fn alert_key(namespace: &str, cronjob: &str, alert_type: &str) -> AlertKey {
    Arc::from(format!("{namespace}/{cronjob}/{alert_type}").as_str())
}
