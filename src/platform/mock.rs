//! In-memory [`super::PlatformClient`] used by tests and by the remediation
//! engine's own unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Event, Pod, Secret};

use super::{OwningCronJob, PlatformClient};
use crate::crd::monitor::PropagationPolicy;
use crate::error::{PlatformError, Result};

#[derive(Default)]
pub struct MockPlatformClient {
    pub cron_jobs: Mutex<BTreeMap<(String, String), CronJob>>,
    pub jobs: Mutex<BTreeMap<(String, String), Job>>,
    pub pods: Mutex<BTreeMap<(String, String), Pod>>,
    pub events: Mutex<Vec<Event>>,
    pub secrets: Mutex<BTreeMap<(String, String, String), String>>,
    pub deleted_jobs: Mutex<Vec<String>>,
    pub created_jobs: Mutex<Vec<String>>,
}

impl MockPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlatformClient for MockPlatformClient {
    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<Option<CronJob>> {
        Ok(self
            .cron_jobs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list_cron_jobs(&self, namespace: &str) -> Result<Vec<CronJob>> {
        Ok(self
            .cron_jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, cj)| cj.clone())
            .collect())
    }

    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn set_cron_job_suspend(
        &self,
        namespace: &str,
        name: &str,
        suspend: bool,
    ) -> Result<()> {
        let mut cron_jobs = self.cron_jobs.lock().unwrap();
        let cron_job = cron_jobs
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| PlatformError::NotFound(name.to_string()))?;
        if let Some(spec) = cron_job.spec.as_mut() {
            spec.suspend = Some(suspend);
        }
        Ok(())
    }

    async fn create_job_from_template(
        &self,
        namespace: &str,
        _cron_job_name: &str,
        generated_name: &str,
        _extra_labels: BTreeMap<String, String>,
        _extra_annotations: BTreeMap<String, String>,
    ) -> Result<Job> {
        self.created_jobs
            .lock()
            .unwrap()
            .push(generated_name.to_string());
        let job = Job {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some(generated_name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: None,
            status: None,
        };
        self.jobs
            .lock()
            .unwrap()
            .insert((namespace.to_string(), generated_name.to_string()), job.clone());
        Ok(job)
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete_job(
        &self,
        namespace: &str,
        name: &str,
        _propagation_policy: PropagationPolicy,
    ) -> Result<()> {
        self.jobs
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        self.deleted_jobs.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn owning_cron_job(&self, job: &Job) -> Option<OwningCronJob> {
        let namespace = job.metadata.namespace.clone()?;
        let owner = job
            .metadata
            .owner_references
            .as_ref()?
            .iter()
            .find(|o| o.kind == "CronJob")?;
        Some(OwningCronJob {
            namespace,
            name: owner.name.clone(),
        })
    }

    async fn get_pod_for_job(&self, namespace: &str, job_name: &str) -> Result<Option<Pod>> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), job_name.to_string()))
            .cloned())
    }

    async fn get_pod_logs(
        &self,
        _namespace: &str,
        _pod_name: &str,
        _max_bytes: usize,
    ) -> Result<String> {
        Ok(String::new())
    }

    async fn list_events_for_object(
        &self,
        _namespace: &str,
        _object_name: &str,
        _object_kind: &str,
    ) -> Result<Vec<Event>> {
        Ok(self.events.lock().unwrap().clone())
    }

    async fn get_secret_key(&self, namespace: &str, name: &str, key: &str) -> Result<String> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| {
                PlatformError::NotFound(format!("secret key {namespace}/{name}#{key}")).into()
            })
    }
}
