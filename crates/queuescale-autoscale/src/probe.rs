//! Worker activity probe — is a pod safe to remove right now?

use std::sync::Arc;

use tracing::{debug, warn};

use queuescale_core::{WorkerInspector, WorkerPod};

#[derive(Clone)]
pub struct WorkerActivityProbe {
    inspector: Arc<dyn WorkerInspector>,
    identity_prefix: String,
}

impl WorkerActivityProbe {
    pub fn new(inspector: Arc<dyn WorkerInspector>, identity_prefix: &str) -> Self {
        Self {
            inspector,
            identity_prefix: identity_prefix.to_string(),
        }
    }

    /// The identity a worker in `pod_name` registers under.
    pub fn worker_identity(&self, pod_name: &str) -> String {
        format!("{}{}", self.identity_prefix, pod_name)
    }

    /// Whether the pod's worker holds no in-flight task.
    ///
    /// Inspection failing, no worker answering at all, or the worker
    /// answering without its task list reads as busy. A worker missing from
    /// an otherwise populated answer reads as idle.
    pub async fn is_pod_idle(&self, pod: &WorkerPod) -> bool {
        let identity = self.worker_identity(&pod.name);

        let active = match self.inspector.active_tasks().await {
            Ok(active) => active,
            Err(e) => {
                warn!(pod = %pod.name, error = %e, "worker inspection failed, assuming busy");
                return false;
            }
        };

        if active.is_empty() {
            debug!(pod = %pod.name, "no worker answered inspection, assuming busy");
            return false;
        }

        match active.get(&identity) {
            Some(Some(tasks)) => {
                debug!(pod = %pod.name, active_tasks = tasks.len(), "inspected worker");
                tasks.is_empty()
            }
            Some(None) => {
                warn!(pod = %pod.name, %identity, "worker reported no task list, assuming busy");
                false
            }
            // Idle or disconnected. A disconnected worker still finishing a
            // task is misclassified here.
            None => {
                debug!(pod = %pod.name, %identity, "worker not found in active tasks");
                true
            }
        }
    }
}
