//! Custom resource definitions for the guardian operator.

pub mod channel;
pub mod guardian_config;
pub mod monitor;

pub use channel::{AlertChannel, ChannelKind, ChannelSpec, ChannelStatus};
pub use guardian_config::{GuardianConfig, GuardianConfigSpec, GuardianConfigStatus};
pub use monitor::{CronJobMonitor, MonitorSpec, MonitorStatus};

use kube::CustomResourceExt;

/// All CRDs this operator installs, in the order `--print-crds` emits them.
pub fn all() -> Vec<kube::core::CustomResourceDefinition> {
    vec![
        CronJobMonitor::crd(),
        AlertChannel::crd(),
        GuardianConfig::crd(),
    ]
}
