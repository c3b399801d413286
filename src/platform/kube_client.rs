//! `kube`-backed [`super::PlatformClient`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Event, Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};

use super::{OwningCronJob, PlatformClient};
use crate::crd::monitor::PropagationPolicy;
use crate::error::{PlatformError, Result};

#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn cron_jobs(&self, namespace: &str) -> Api<CronJob> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn jobs(&self, namespace: &str) -> Api<Job> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn events(&self, namespace: &str) -> Api<Event> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl PlatformClient for KubeClient {
    async fn get_cron_job(&self, namespace: &str, name: &str) -> Result<Option<CronJob>> {
        match self.cron_jobs(namespace).get_opt(name).await {
            Ok(cron_job) => Ok(cron_job),
            Err(e) => Err(PlatformError::Api(e.to_string()).into()),
        }
    }

    async fn list_cron_jobs(&self, namespace: &str) -> Result<Vec<CronJob>> {
        let list = self
            .cron_jobs(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;
        Ok(list.items)
    }

    async fn list_jobs(&self, namespace: &str) -> Result<Vec<Job>> {
        let list = self
            .jobs(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;
        Ok(list.items)
    }

    async fn set_cron_job_suspend(
        &self,
        namespace: &str,
        name: &str,
        suspend: bool,
    ) -> Result<()> {
        let patch = serde_json::json!({ "spec": { "suspend": suspend } });
        self.cron_jobs(namespace)
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;
        Ok(())
    }

    async fn create_job_from_template(
        &self,
        namespace: &str,
        cron_job_name: &str,
        generated_name: &str,
        extra_labels: BTreeMap<String, String>,
        extra_annotations: BTreeMap<String, String>,
    ) -> Result<Job> {
        let cron_job = self
            .get_cron_job(namespace, cron_job_name)
            .await?
            .ok_or_else(|| PlatformError::NotFound(cron_job_name.to_string()))?;

        let template = cron_job
            .spec
            .as_ref()
            .map(|s| s.job_template.clone())
            .ok_or_else(|| PlatformError::Api("cron job has no job template".into()))?;

        let mut labels = template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.clone())
            .unwrap_or_default();
        labels.extend(extra_labels);

        let mut annotations = template
            .metadata
            .as_ref()
            .and_then(|m| m.annotations.clone())
            .unwrap_or_default();
        annotations.extend(extra_annotations);

        let job = Job {
            metadata: ObjectMeta {
                name: Some(generated_name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                annotations: Some(annotations),
                owner_references: Some(vec![OwnerReference {
                    api_version: "batch/v1".to_string(),
                    kind: "CronJob".to_string(),
                    name: cron_job_name.to_string(),
                    uid: cron_job.metadata.uid.clone().unwrap_or_default(),
                    controller: Some(true),
                    block_owner_deletion: Some(true),
                }]),
                ..Default::default()
            },
            spec: template.spec,
            status: None,
        };

        self.jobs(namespace)
            .create(&PostParams::default(), &job)
            .await
            .map_err(|e| PlatformError::Api(e.to_string()).into())
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Option<Job>> {
        self.jobs(namespace)
            .get_opt(name)
            .await
            .map_err(|e| PlatformError::Api(e.to_string()).into())
    }

    async fn delete_job(
        &self,
        namespace: &str,
        name: &str,
        propagation_policy: PropagationPolicy,
    ) -> Result<()> {
        let policy = match propagation_policy {
            PropagationPolicy::Foreground => "Foreground",
            PropagationPolicy::Orphan => "Orphan",
        };
        let params = DeleteParams {
            propagation_policy: Some(match propagation_policy {
                PropagationPolicy::Foreground => kube::api::PropagationPolicy::Foreground,
                PropagationPolicy::Orphan => kube::api::PropagationPolicy::Orphan,
            }),
            ..Default::default()
        };
        tracing::debug!(namespace, name, policy, "deleting stuck job");
        self.jobs(namespace)
            .delete(name, &params)
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;
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
        let list = self
            .pods(namespace)
            .list(&ListParams::default().labels(&format!("job-name={job_name}")))
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;
        Ok(list.items.into_iter().next())
    }

    async fn get_pod_logs(
        &self,
        namespace: &str,
        pod_name: &str,
        max_bytes: usize,
    ) -> Result<String> {
        let logs = self
            .pods(namespace)
            .logs(pod_name, &kube::api::LogParams::default())
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;

        if logs.len() > max_bytes {
            let mut truncated = logs[..max_bytes].to_string();
            truncated.push_str("\n...[truncated]");
            Ok(truncated)
        } else {
            Ok(logs)
        }
    }

    async fn list_events_for_object(
        &self,
        namespace: &str,
        object_name: &str,
        object_kind: &str,
    ) -> Result<Vec<Event>> {
        let field_selector = format!(
            "involvedObject.name={object_name},involvedObject.kind={object_kind}"
        );
        let list = self
            .events(namespace)
            .list(&ListParams::default().fields(&field_selector))
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;
        Ok(list.items)
    }

    async fn get_secret_key(&self, namespace: &str, name: &str, key: &str) -> Result<String> {
        let secret = self
            .secrets(namespace)
            .get(name)
            .await
            .map_err(|e| PlatformError::Api(e.to_string()))?;

        let data = secret
            .data
            .ok_or_else(|| PlatformError::NotFound(format!("secret {namespace}/{name} has no data")))?;
        let value = data
            .get(key)
            .ok_or_else(|| PlatformError::NotFound(format!("key {key} in secret {namespace}/{name}")))?;

        String::from_utf8(value.0.clone())
            .map_err(|e| PlatformError::Api(format!("secret value is not valid UTF-8: {e}")).into())
    }
}
