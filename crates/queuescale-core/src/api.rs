//! Collaborator interfaces consumed by the autoscaler.

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::types::{ActiveTasks, DeploymentInfo, QueueStatus, WorkerPod};

/// The container orchestrator that owns the worker deployment.
///
/// Other actors may write the same deployment concurrently; callers must
/// re-read before every decision instead of trusting earlier results.
#[async_trait]
pub trait OrchestratorApi: Send + Sync {
    /// Read the deployment's selector and declared replica count.
    async fn read_deployment(&self, name: &str) -> ApiResult<DeploymentInfo>;

    /// List pods matching a `k=v,...` label selector, in any phase.
    async fn list_pods(&self, label_selector: &str) -> ApiResult<Vec<WorkerPod>>;

    /// Set the deployment's desired replica count. Idempotent.
    async fn patch_replicas(&self, name: &str, replicas: u32) -> ApiResult<()>;

    /// Request termination of a pod with the given grace period.
    async fn delete_pod(&self, name: &str, grace_period_seconds: u32) -> ApiResult<()>;
}

/// The message broker's management interface.
#[async_trait]
pub trait BrokerManagementApi: Send + Sync {
    async fn queue_status(&self, queue: &str) -> ApiResult<QueueStatus>;
}

/// Live inspection of the worker fleet.
#[async_trait]
pub trait WorkerInspector: Send + Sync {
    /// Active tasks for every worker that answered the inspection.
    async fn active_tasks(&self) -> ApiResult<ActiveTasks>;
}
