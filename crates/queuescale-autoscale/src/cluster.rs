//! Cluster controller — conservative wrapper over the orchestrator.
//!
//! Reads degrade to "unknown" (`None`) or "no pods" (empty list); writes
//! report success as a `bool`. Every error is logged here and never
//! propagates, so one failed call only costs the current tick.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use queuescale_core::{OrchestratorApi, WorkerPod};

#[derive(Clone)]
pub struct ClusterController {
    api: Arc<dyn OrchestratorApi>,
}

impl ClusterController {
    pub fn new(api: Arc<dyn OrchestratorApi>) -> Self {
        Self { api }
    }

    /// Declared replica count, or `None` if it cannot be read.
    pub async fn current_replicas(&self, deployment: &str) -> Option<u32> {
        match self.api.read_deployment(deployment).await {
            Ok(info) => {
                if info.desired_replicas.is_none() {
                    warn!(%deployment, "deployment declares no replica count");
                }
                info.desired_replicas
            }
            Err(e) => {
                error!(%deployment, error = %e, "failed to read current replicas");
                None
            }
        }
    }

    /// Running, non-terminating pods of the deployment.
    ///
    /// Empty on any failure, which makes callers attempt no deletions.
    pub async fn list_running_pods(&self, deployment: &str) -> Vec<WorkerPod> {
        let info = match self.api.read_deployment(deployment).await {
            Ok(info) => info,
            Err(e) => {
                error!(%deployment, error = %e, "failed to read deployment for pod listing");
                return Vec::new();
            }
        };

        let Some(selector) = info.label_selector() else {
            warn!(%deployment, "deployment has no match labels");
            return Vec::new();
        };

        match self.api.list_pods(&selector).await {
            Ok(pods) => {
                let running: Vec<WorkerPod> = pods.into_iter().filter(WorkerPod::is_running).collect();
                debug!(%deployment, count = running.len(), "found running pods");
                running
            }
            Err(e) => {
                error!(%deployment, %selector, error = %e, "failed to list worker pods");
                Vec::new()
            }
        }
    }

    /// Set the desired replica count. Returns whether the orchestrator
    /// accepted the patch.
    pub async fn patch_replicas(&self, deployment: &str, replicas: u32) -> bool {
        match self.api.patch_replicas(deployment, replicas).await {
            Ok(()) => {
                info!(%deployment, replicas, "patched desired replicas");
                true
            }
            Err(e) => {
                error!(%deployment, replicas, error = %e, "failed to patch replicas");
                false
            }
        }
    }

    /// Request termination of one pod. Returns whether the request was
    /// accepted.
    pub async fn delete_pod(&self, pod: &str, grace_period_seconds: u32) -> bool {
        match self.api.delete_pod(pod, grace_period_seconds).await {
            Ok(()) => true,
            Err(e) => {
                error!(%pod, error = %e, "failed to delete pod");
                false
            }
        }
    }
}
