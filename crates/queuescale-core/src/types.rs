//! Views of cluster and broker objects shared across queuescale crates.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Lifecycle phase reported by the orchestrator for a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Map the orchestrator's phase string. Anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// A worker pod as observed during a single tick.
///
/// Never cached across ticks: the pod set can change under us at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPod {
    pub name: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at_ms: i64,
    pub phase: PodPhase,
    /// A deletion timestamp is set; the pod is already terminating.
    pub deleting: bool,
}

impl WorkerPod {
    /// Running and not already on its way out.
    pub fn is_running(&self) -> bool {
        self.phase == PodPhase::Running && !self.deleting
    }
}

/// The parts of a worker deployment the autoscaler reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentInfo {
    pub name: String,
    /// `matchLabels` of the deployment's pod selector.
    pub selector: BTreeMap<String, String>,
    /// Desired replica count as currently declared.
    pub desired_replicas: Option<u32>,
}

impl DeploymentInfo {
    /// Render the selector as `k1=v1,k2=v2`, or `None` when it has no labels.
    pub fn label_selector(&self) -> Option<String> {
        if self.selector.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .selector
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        Some(parts.join(","))
    }
}

/// Queue status as returned by the broker's management API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct QueueStatus {
    /// Messages waiting to be claimed by a worker.
    #[serde(default)]
    pub messages_ready: u64,
}

/// Active task ids keyed by worker identity (`celery@<pod>`).
///
/// `None` marks a worker that answered without reporting its tasks.
pub type ActiveTasks = HashMap<String, Option<Vec<String>>>;

/// Which pods a scale-down tries to remove first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RemovalOrder {
    /// Most recently created first; long-running pods survive.
    #[default]
    #[serde(rename = "newest", alias = "newest-first")]
    NewestFirst,
    /// Oldest first; bounds pod lifetime.
    #[serde(rename = "oldest", alias = "oldest-first")]
    OldestFirst,
}

impl RemovalOrder {
    /// Sort pods into removal order. Ties keep name order for determinism.
    pub fn sort(self, pods: &mut [WorkerPod]) {
        pods.sort_by(|a, b| {
            let by_age = match self {
                RemovalOrder::NewestFirst => b.created_at_ms.cmp(&a.created_at_ms),
                RemovalOrder::OldestFirst => a.created_at_ms.cmp(&b.created_at_ms),
            };
            by_age.then_with(|| a.name.cmp(&b.name))
        });
    }
}

impl FromStr for RemovalOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "newest-first" => Ok(RemovalOrder::NewestFirst),
            "oldest" | "oldest-first" => Ok(RemovalOrder::OldestFirst),
            other => Err(format!("expected `newest` or `oldest`, got `{other}`")),
        }
    }
}

impl fmt::Display for RemovalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalOrder::NewestFirst => f.write_str("newest"),
            RemovalOrder::OldestFirst => f.write_str("oldest"),
        }
    }
}
