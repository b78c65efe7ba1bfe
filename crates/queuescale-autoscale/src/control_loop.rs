//! Control loop — periodic read, decide, act.
//!
//! One tick runs to completion before the next begins, so loop state needs
//! no synchronization. Shutdown is cooperative: the flag is checked at the
//! top of every iteration and cuts the inter-tick sleep short, but never
//! aborts a tick in flight.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use queuescale_core::{
    BrokerManagementApi, ConfigError, OrchestratorApi, ScalerConfig, WorkerInspector,
};

use crate::cluster::ClusterController;
use crate::coordinator::GracefulScaleCoordinator;
use crate::probe::WorkerActivityProbe;
use crate::queue::QueueMetricsProvider;
use crate::scaler::compute_target;

/// Lifecycle of the loop. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Running,
    ShuttingDown,
    Stopped,
}

/// Cooldown bookkeeping, owned by one loop.
#[derive(Debug, Default)]
pub struct ControlLoopState {
    /// `None` until the first accepted scale-up.
    pub last_scale_up: Option<Instant>,
    /// `None` until the first scale-down that removed something.
    pub last_scale_down: Option<Instant>,
    pub shutdown_requested: bool,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Replica count unreadable; nothing else was attempted.
    ReplicasUnknown,
    /// No scaling warranted.
    Steady { queue_length: u64, replicas: u32 },
    ScaledUp { from: u32, to: u32 },
    /// Scale-up was due but the orchestrator rejected the patch.
    ScaleUpFailed { from: u32, to: u32 },
    ScaleUpCoolingDown { remaining: Duration },
    ScaledDown { from: u32, requested: u32, achieved: u32 },
    ScaleDownCoolingDown { remaining: Duration },
}

pub struct ControlLoop {
    config: ScalerConfig,
    queue: QueueMetricsProvider,
    cluster: ClusterController,
    coordinator: GracefulScaleCoordinator,
    state: ControlLoopState,
    phase: LoopPhase,
}

impl ControlLoop {
    /// Wire the loop to its collaborators. Fails if `config` is invalid.
    pub fn new(
        config: ScalerConfig,
        orchestrator: Arc<dyn OrchestratorApi>,
        broker: Arc<dyn BrokerManagementApi>,
        inspector: Arc<dyn WorkerInspector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let cluster = ClusterController::new(orchestrator);
        let probe = WorkerActivityProbe::new(inspector, &config.worker_name_prefix);
        let coordinator = GracefulScaleCoordinator::new(
            cluster.clone(),
            probe,
            config.grace_period_seconds,
            config.removal_order,
        );

        Ok(Self {
            queue: QueueMetricsProvider::new(broker),
            cluster,
            coordinator,
            config,
            state: ControlLoopState::default(),
            phase: LoopPhase::Running,
        })
    }

    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    pub fn state(&self) -> &ControlLoopState {
        &self.state
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Run one read-decide-act cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        let config = &self.config;
        let deployment = config.deployment_name.as_str();

        let queue_length = self.queue.queue_length(&config.queue_name).await;
        let Some(current) = self.cluster.current_replicas(deployment).await else {
            warn!(%deployment, "could not get current replicas, skipping this cycle");
            return TickOutcome::ReplicasUnknown;
        };

        let now = Instant::now();
        let Some(target) = compute_target(queue_length, current, config) else {
            debug!(
                queue_length,
                replicas = current,
                threshold = config.threshold,
                "no scaling needed"
            );
            return TickOutcome::Steady {
                queue_length,
                replicas: current,
            };
        };

        if target > current {
            if let Some(remaining) =
                cooldown_remaining(self.state.last_scale_up, config.scale_up_cooldown, now)
            {
                debug!(remaining_secs = remaining.as_secs_f64(), "scale up on cooldown");
                return TickOutcome::ScaleUpCoolingDown { remaining };
            }

            info!(%deployment, from = current, to = target, queue_length, "scaling up");
            if self.cluster.patch_replicas(deployment, target).await {
                self.state.last_scale_up = Some(now);
                TickOutcome::ScaledUp {
                    from: current,
                    to: target,
                }
            } else {
                TickOutcome::ScaleUpFailed {
                    from: current,
                    to: target,
                }
            }
        } else {
            if let Some(remaining) =
                cooldown_remaining(self.state.last_scale_down, config.scale_down_cooldown, now)
            {
                debug!(remaining_secs = remaining.as_secs_f64(), "scale down on cooldown");
                return TickOutcome::ScaleDownCoolingDown { remaining };
            }

            info!(%deployment, from = current, to = target, queue_length, "scaling down");
            let achieved = self.coordinator.scale_down(deployment, target).await;
            if achieved < current {
                self.state.last_scale_down = Some(now);
            }
            TickOutcome::ScaledDown {
                from: current,
                requested: target,
                achieved,
            }
        }
    }

    /// Tick every `check_interval` until `shutdown` turns true or its
    /// sender goes away.
    ///
    /// A tick that panics is logged and followed by a longer backoff;
    /// it never ends the loop.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            deployment = %self.config.deployment_name,
            queue = %self.config.queue_name,
            interval_secs = self.config.check_interval.as_secs(),
            "scaling loop started"
        );

        loop {
            if *shutdown.borrow() {
                self.state.shutdown_requested = true;
            }
            if self.state.shutdown_requested {
                self.phase = LoopPhase::ShuttingDown;
                break;
            }

            let pause = match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(outcome) => {
                    debug!(?outcome, "tick finished");
                    self.config.check_interval
                }
                Err(panic) => {
                    let backoff = self.config.tick_error_backoff();
                    error!(
                        error = %panic_message(panic.as_ref()),
                        backoff_secs = backoff.as_secs(),
                        "error in scaling loop"
                    );
                    backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.state.shutdown_requested = true;
                    }
                }
            }
        }

        self.phase = LoopPhase::Stopped;
        info!("scaling loop stopped gracefully");
    }
}

/// Time left before another action in the same direction is allowed.
fn cooldown_remaining(last: Option<Instant>, cooldown: Duration, now: Instant) -> Option<Duration> {
    let elapsed = now.saturating_duration_since(last?);
    (elapsed < cooldown).then(|| cooldown - elapsed)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
