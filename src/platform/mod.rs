//! Contract for the external orchestrator platform (spec §6): `CronJob`,
//! `Job`, `Pod`, `Event`, `Secret`. Out of scope beyond this interface — the
//! reconcilers and remediation engine depend only on [`PlatformClient`].

pub mod kube_client;
pub mod mock;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Event, Pod, Secret};
use std::collections::BTreeMap;

use crate::crd::monitor::PropagationPolicy;
use crate::error::Result;

pub use kube_client::KubeClient;
pub use mock::MockPlatformClient;

/// A child job's owning cron job, resolved through owner references.
#[derive(Debug, Clone)]
pub struct OwningCronJob {
    pub namespace: String,
    pub name: String,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<Option<CronJob>>;

    async fn list_cron_jobs(&self, namespace: &str) -> Result<Vec<CronJob>>;

    /// All jobs in a namespace, for the completion handler's poll-based
    /// discovery of terminal transitions.
    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>>;

    /// Sets `spec.suspend` without touching any other field.
    async fn set_cron_job_suspend(&self, namespace: &str, name: &str, suspend: bool)
        -> Result<()>;

    /// Creates a new `Job` from a cron job's job template, with the given
    /// extra labels/annotations merged in (used by manual-run and retry).
    async fn create_job_from_template(
        &self,
        namespace: &str,
        cron_job_name: &str,
        generated_name: &str,
        extra_labels: BTreeMap<String, String>,
        extra_annotations: BTreeMap<String, String>,
    ) -> Result<Job>;

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>>;

    async fn delete_job(
        &self,
        namespace: &str,
        name: &str,
        propagation_policy: PropagationPolicy,
    ) -> Result<()>;

    /// Owner-reference walk: returns the owning cron job if the job is
    /// owned by one.
    async fn owning_cron_job(&self, job: &Job) -> Option<OwningCronJob>;

    async fn get_pod_for_job(&self, namespace: &str, job_name: &str) -> Result<Option<Pod>>;

    async fn get_pod_logs(&self, namespace: &str, pod_name: &str, max_bytes: usize)
        -> Result<String>;

    async fn list_events_for_object(
        &self,
        namespace: &str,
        object_name: &str,
        object_kind: &str,
    ) -> Result<Vec<Event>>;

    /// Resolves a single key from a `Secret`. Never cached by the caller.
    async fn get_secret_key(&self, namespace: &str, name: &str, key: &str) -> Result<String>;
}
