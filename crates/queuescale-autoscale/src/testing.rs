//! In-memory collaborators for tests. Every call is recorded.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use queuescale_core::{
    ActiveTasks, ApiError, ApiResult, BrokerManagementApi, DeploymentInfo, OrchestratorApi,
    PodPhase, QueueStatus, ScalerConfig, WorkerInspector, WorkerPod,
};

/// A valid config with the documented defaults and no cooldowns.
pub fn test_config() -> ScalerConfig {
    let mut config = ScalerConfig::from_lookup(|key| match key {
        "DEPLOYMENT_NAME" => Some("exam-worker".to_string()),
        "QUEUE_NAME" => Some("evaluation".to_string()),
        _ => None,
    })
    .unwrap();
    config.scale_up_cooldown = Duration::ZERO;
    config.scale_down_cooldown = Duration::ZERO;
    config
}

pub fn running_pod(name: &str, created_at_ms: i64) -> WorkerPod {
    WorkerPod {
        name: name.to_string(),
        created_at_ms,
        phase: PodPhase::Running,
        deleting: false,
    }
}

#[derive(Default)]
struct ClusterState {
    desired_replicas: Option<u32>,
    selector: BTreeMap<String, String>,
    pods: Vec<WorkerPod>,
    fail_read: bool,
    fail_list: bool,
    fail_patch: bool,
    reject_delete: HashSet<String>,
    patches: Vec<u32>,
    deletes: Vec<(String, u32)>,
}

/// Fake orchestrator holding one deployment and its pods.
pub struct FakeOrchestrator {
    state: Mutex<ClusterState>,
}

impl FakeOrchestrator {
    /// `n` running pods named `worker-0..n`, `worker-i` created at `i` seconds.
    pub fn with_running_pods(n: u32) -> Self {
        let pods = (0..n)
            .map(|i| running_pod(&format!("worker-{i}"), i64::from(i) * 1000))
            .collect();
        let mut selector = BTreeMap::new();
        selector.insert("app".to_string(), "exam-worker".to_string());
        Self {
            state: Mutex::new(ClusterState {
                desired_replicas: Some(n),
                selector,
                pods,
                ..ClusterState::default()
            }),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut ClusterState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_desired_replicas(&self, replicas: Option<u32>) {
        self.with(|s| s.desired_replicas = replicas);
    }

    pub fn push_pod(&self, pod: WorkerPod) {
        self.with(|s| s.pods.push(pod));
    }

    pub fn clear_selector(&self) {
        self.with(|s| s.selector.clear());
    }

    pub fn fail_read(&self, fail: bool) {
        self.with(|s| s.fail_read = fail);
    }

    pub fn fail_list(&self, fail: bool) {
        self.with(|s| s.fail_list = fail);
    }

    pub fn fail_patch(&self, fail: bool) {
        self.with(|s| s.fail_patch = fail);
    }

    pub fn reject_delete(&self, pod: &str) {
        self.with(|s| s.reject_delete.insert(pod.to_string()));
    }

    pub fn patches(&self) -> Vec<u32> {
        self.with(|s| s.patches.clone())
    }

    pub fn deleted(&self) -> Vec<String> {
        self.with(|s| s.deletes.iter().map(|(name, _)| name.clone()).collect())
    }

    pub fn delete_requests(&self) -> Vec<(String, u32)> {
        self.with(|s| s.deletes.clone())
    }
}

#[async_trait]
impl OrchestratorApi for FakeOrchestrator {
    async fn read_deployment(&self, name: &str) -> ApiResult<DeploymentInfo> {
        self.with(|s| {
            if s.fail_read {
                return Err(ApiError::Orchestrator("deployments.apps is forbidden".to_string()));
            }
            Ok(DeploymentInfo {
                name: name.to_string(),
                selector: s.selector.clone(),
                desired_replicas: s.desired_replicas,
            })
        })
    }

    async fn list_pods(&self, _label_selector: &str) -> ApiResult<Vec<WorkerPod>> {
        self.with(|s| {
            if s.fail_list {
                return Err(ApiError::Orchestrator("pods is forbidden".to_string()));
            }
            Ok(s.pods.clone())
        })
    }

    async fn patch_replicas(&self, _name: &str, replicas: u32) -> ApiResult<()> {
        self.with(|s| {
            if s.fail_patch {
                return Err(ApiError::Orchestrator("conflict".to_string()));
            }
            s.patches.push(replicas);
            s.desired_replicas = Some(replicas);
            Ok(())
        })
    }

    async fn delete_pod(&self, name: &str, grace_period_seconds: u32) -> ApiResult<()> {
        self.with(|s| {
            if s.reject_delete.contains(name) {
                return Err(ApiError::Orchestrator(format!("pods \"{name}\" not found")));
            }
            s.deletes.push((name.to_string(), grace_period_seconds));
            if let Some(pod) = s.pods.iter_mut().find(|p| p.name == name) {
                pod.deleting = true;
            }
            Ok(())
        })
    }
}

/// Fake broker reporting a fixed backlog, or failing.
pub struct FakeBroker {
    ready: Mutex<Option<u64>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl FakeBroker {
    pub fn with_ready(ready: u64) -> Self {
        Self {
            ready: Mutex::new(Some(ready)),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            ready: Mutex::new(None),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerManagementApi for FakeBroker {
    async fn queue_status(&self, _queue: &str) -> ApiResult<QueueStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let ready = *self.ready.lock().unwrap();
        ready
            .map(|messages_ready| QueueStatus { messages_ready })
            .ok_or_else(|| ApiError::Connect("connection refused".to_string()))
    }
}

/// Broker whose every call panics.
#[derive(Default)]
pub struct PanickingBroker {
    calls: AtomicUsize,
}

impl PanickingBroker {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerManagementApi for PanickingBroker {
    async fn queue_status(&self, _queue: &str) -> ApiResult<QueueStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("broker client bug");
    }
}

/// Fake inspector returning a fixed active-task map, or failing.
pub struct FakeInspector {
    active: Mutex<Option<ActiveTasks>>,
    calls: AtomicUsize,
}

impl FakeInspector {
    /// Every listed worker is connected and idle.
    pub fn idle(workers: &[&str]) -> Self {
        let pairs: Vec<(&str, usize)> = workers.iter().map(|w| (*w, 0)).collect();
        Self::with_tasks(&pairs)
    }

    /// `(worker identity, active task count)` pairs.
    pub fn with_tasks(workers: &[(&str, usize)]) -> Self {
        let active: ActiveTasks = workers
            .iter()
            .map(|(w, n)| {
                let tasks = (0..*n).map(|i| format!("{w}-task-{i}")).collect();
                (w.to_string(), Some(tasks))
            })
            .collect();
        Self {
            active: Mutex::new(Some(active)),
            calls: AtomicUsize::new(0),
        }
    }

    /// List `worker` without reporting its tasks.
    pub fn mark_unknown(&self, worker: &str) {
        if let Some(active) = self.active.lock().unwrap().as_mut() {
            active.insert(worker.to_string(), None);
        }
    }

    pub fn unavailable() -> Self {
        Self {
            active: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerInspector for FakeInspector {
    async fn active_tasks(&self) -> ApiResult<ActiveTasks> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.active
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Timeout(Duration::from_secs(1)))
    }
}
