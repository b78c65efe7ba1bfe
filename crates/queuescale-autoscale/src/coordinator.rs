//! Graceful scale-down — remove only idle pods, then reconcile.
//!
//! ```text
//! pods    = running pods, sorted by removal order
//! need    = len(pods) - target
//! for pod in pods while removed < need:
//!     idle?  -> delete, removed += 1
//!     busy?  -> skip (never force, never wait)
//! patch replicas to len(pods) - removed
//! ```
//!
//! Patching to what was actually removed, rather than the requested target,
//! keeps the orchestrator from replacing the busy pods we left alone by
//! killing others.

use tracing::info;

use queuescale_core::RemovalOrder;

use crate::cluster::ClusterController;
use crate::probe::WorkerActivityProbe;

#[derive(Clone)]
pub struct GracefulScaleCoordinator {
    cluster: ClusterController,
    probe: WorkerActivityProbe,
    grace_period_seconds: u32,
    order: RemovalOrder,
}

impl GracefulScaleCoordinator {
    pub fn new(
        cluster: ClusterController,
        probe: WorkerActivityProbe,
        grace_period_seconds: u32,
        order: RemovalOrder,
    ) -> Self {
        Self {
            cluster,
            probe,
            grace_period_seconds,
            order,
        }
    }

    /// Remove idle pods until `target` is reached or candidates run out.
    ///
    /// Returns the replica count actually achieved.
    pub async fn scale_down(&self, deployment: &str, target: u32) -> u32 {
        let mut pods = self.cluster.list_running_pods(deployment).await;
        let current = u32::try_from(pods.len()).unwrap_or(u32::MAX);

        if current <= target {
            info!(%deployment, current, target, "already at or below target replicas");
            return current;
        }

        let need = current - target;
        info!(%deployment, need, target, order = %self.order, "removing idle pods");
        self.order.sort(&mut pods);

        let mut removed = 0u32;
        for pod in &pods {
            if removed >= need {
                break;
            }
            if !self.probe.is_pod_idle(pod).await {
                info!(pod = %pod.name, "pod is busy, skipping");
                continue;
            }
            info!(pod = %pod.name, "removing idle pod");
            if self
                .cluster
                .delete_pod(&pod.name, self.grace_period_seconds)
                .await
            {
                removed += 1;
            }
        }

        let achieved = current - removed;
        info!(%deployment, removed, achieved, requested = target, "scale-down pass finished");
        self.cluster.patch_replicas(deployment, achieved).await;
        achieved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{FakeInspector, FakeOrchestrator};

    fn coordinator(
        orchestrator: &Arc<FakeOrchestrator>,
        inspector: &Arc<FakeInspector>,
        order: RemovalOrder,
    ) -> GracefulScaleCoordinator {
        GracefulScaleCoordinator::new(
            ClusterController::new(orchestrator.clone()),
            WorkerActivityProbe::new(inspector.clone(), "celery@"),
            30,
            order,
        )
    }

    fn all_idle(n: u32) -> Arc<FakeInspector> {
        let names: Vec<String> = (0..n).map(|i| format!("celery@worker-{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        Arc::new(FakeInspector::idle(&refs))
    }

    #[tokio::test]
    async fn removes_newest_idle_pods_first() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(5));
        let inspector = all_idle(5);
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        assert_eq!(c.scale_down("exam-worker", 3).await, 3);
        assert_eq!(orchestrator.deleted(), vec!["worker-4", "worker-3"]);
        assert_eq!(orchestrator.patches(), vec![3]);
    }

    #[tokio::test]
    async fn oldest_first_order_is_honoured() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(5));
        let inspector = all_idle(5);
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::OldestFirst);

        assert_eq!(c.scale_down("exam-worker", 4).await, 4);
        assert_eq!(orchestrator.deleted(), vec!["worker-0"]);
    }

    #[tokio::test]
    async fn deletes_use_configured_grace_period() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(2));
        let inspector = all_idle(2);
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        c.scale_down("exam-worker", 1).await;
        assert_eq!(orchestrator.delete_requests(), vec![("worker-1".to_string(), 30)]);
    }

    #[tokio::test]
    async fn busy_pods_are_skipped_and_replicas_reconciled_to_achieved() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(5));
        // worker-4 and worker-3 are busy; only worker-2 can go.
        let inspector = Arc::new(FakeInspector::with_tasks(&[
            ("celery@worker-0", 1),
            ("celery@worker-1", 1),
            ("celery@worker-2", 0),
            ("celery@worker-3", 2),
            ("celery@worker-4", 1),
        ]));
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        // Asked for 5 -> 2, only one pod was idle.
        assert_eq!(c.scale_down("exam-worker", 2).await, 4);
        assert_eq!(orchestrator.deleted(), vec!["worker-2"]);
        assert_eq!(orchestrator.patches(), vec![4]);
    }

    #[tokio::test]
    async fn never_deletes_more_than_needed() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(6));
        let inspector = all_idle(6);
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        assert_eq!(c.scale_down("exam-worker", 5).await, 5);
        assert_eq!(orchestrator.deleted().len(), 1);
        // Stops probing once the quota is met.
        assert_eq!(inspector.calls(), 1);
    }

    #[tokio::test]
    async fn worker_without_task_list_is_kept() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(5));
        let inspector = all_idle(5);
        inspector.mark_unknown("celery@worker-4");
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        assert_eq!(c.scale_down("exam-worker", 4).await, 4);
        assert_eq!(orchestrator.deleted(), vec!["worker-3"]);
    }

    #[tokio::test]
    async fn inspection_outage_deletes_nothing() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(4));
        let inspector = Arc::new(FakeInspector::unavailable());
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        assert_eq!(c.scale_down("exam-worker", 3).await, 4);
        assert!(orchestrator.deleted().is_empty());
        assert_eq!(orchestrator.patches(), vec![4]);
    }

    #[tokio::test]
    async fn rejected_delete_is_not_counted() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(4));
        orchestrator.reject_delete("worker-3");
        let inspector = all_idle(4);
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        // worker-3 is rejected, worker-2 takes its place.
        assert_eq!(c.scale_down("exam-worker", 3).await, 3);
        assert_eq!(orchestrator.deleted(), vec!["worker-2"]);
        assert_eq!(orchestrator.patches(), vec![3]);
    }

    #[tokio::test]
    async fn at_or_below_target_is_a_no_op() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(3));
        let inspector = all_idle(3);
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        assert_eq!(c.scale_down("exam-worker", 3).await, 3);
        assert!(orchestrator.deleted().is_empty());
        assert!(orchestrator.patches().is_empty());
        assert_eq!(inspector.calls(), 0);
    }

    #[tokio::test]
    async fn pod_listing_failure_is_a_no_op() {
        let orchestrator = Arc::new(FakeOrchestrator::with_running_pods(5));
        orchestrator.fail_list(true);
        let inspector = all_idle(5);
        let c = coordinator(&orchestrator, &inspector, RemovalOrder::NewestFirst);

        assert_eq!(c.scale_down("exam-worker", 3).await, 0);
        assert!(orchestrator.deleted().is_empty());
        assert!(orchestrator.patches().is_empty());
    }
}
