//! `OrchestratorApi` over the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams};
use kube::Client;
use serde_json::json;
use tracing::debug;

use queuescale_core::{
    ApiError, ApiResult, DeploymentInfo, OrchestratorApi, PodPhase, WorkerPod,
};

/// Talks to the API server for a single namespace.
#[derive(Clone)]
pub struct KubeOrchestrator {
    deployments: Api<Deployment>,
    pods: Api<Pod>,
    namespace: String,
}

impl KubeOrchestrator {
    /// Build a client from the ambient environment (in-cluster service
    /// account, or the local kubeconfig).
    pub async fn connect(namespace: &str) -> Result<Self, kube::Error> {
        let client = Client::try_default().await?;
        Ok(Self::new(client, namespace))
    }

    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            deployments: Api::namespaced(client.clone(), namespace),
            pods: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl OrchestratorApi for KubeOrchestrator {
    async fn read_deployment(&self, name: &str) -> ApiResult<DeploymentInfo> {
        let deployment = self.deployments.get(name).await.map_err(kube_err)?;
        Ok(deployment_info(name, &deployment))
    }

    async fn list_pods(&self, label_selector: &str) -> ApiResult<Vec<WorkerPod>> {
        let params = ListParams::default().labels(label_selector);
        let list = self.pods.list(&params).await.map_err(kube_err)?;
        let pods: Vec<WorkerPod> = list.items.iter().filter_map(worker_pod).collect();
        debug!(selector = %label_selector, count = pods.len(), "listed pods");
        Ok(pods)
    }

    async fn patch_replicas(&self, name: &str, replicas: u32) -> ApiResult<()> {
        let patch = json!({ "spec": { "replicas": replicas } });
        self.deployments
            .patch_scale(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(kube_err)?;
        Ok(())
    }

    async fn delete_pod(&self, name: &str, grace_period_seconds: u32) -> ApiResult<()> {
        let params = DeleteParams {
            grace_period_seconds: Some(grace_period_seconds),
            ..DeleteParams::default()
        };
        self.pods.delete(name, &params).await.map_err(kube_err)?;
        Ok(())
    }
}

fn kube_err(e: kube::Error) -> ApiError {
    ApiError::Orchestrator(e.to_string())
}

/// Extract selector labels and desired replicas from a deployment.
pub fn deployment_info(name: &str, deployment: &Deployment) -> DeploymentInfo {
    let spec = deployment.spec.as_ref();
    DeploymentInfo {
        name: name.to_string(),
        selector: spec
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default(),
        desired_replicas: spec
            .and_then(|s| s.replicas)
            .and_then(|r| u32::try_from(r).ok()),
    }
}

/// Map a pod to the autoscaler's view. Pods without a name are skipped.
pub fn worker_pod(pod: &Pod) -> Option<WorkerPod> {
    let name = pod.metadata.name.clone()?;
    let created_at_ms = pod
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0.timestamp_millis())
        .unwrap_or(0);
    let phase = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(PodPhase::parse)
        .unwrap_or(PodPhase::Unknown);

    Some(WorkerPod {
        name,
        created_at_ms,
        phase,
        deleting: pod.metadata.deletion_timestamp.is_some(),
    })
}
