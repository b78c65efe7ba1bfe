//! queuescale-autoscale — backlog-driven worker scaling.
//!
//! Each tick reads the broker backlog and the deployment's declared
//! replica count, decides a target, and acts on it. Scale-up patches the
//! replica count directly; scale-down removes only workers that hold no
//! in-flight task and then reconciles the count to what was removed.
//!
//! # Scaling Algorithm
//!
//! ```text
//! queue     = messages ready on the work queue (0 if unreadable)
//! current   = declared replicas (skip tick if unreadable)
//!
//! if queue > threshold:
//!     target = min(current + max(1, floor(queue * up_factor)), max_replicas)
//!     ScaleUp(target)              // unless within scale_up_cooldown
//!
//! if queue < max(1, threshold / 2):
//!     target = max(current - max(1, floor(down_factor)), min_replicas)
//!     GracefulScaleDown(target)    // unless within scale_down_cooldown
//! ```
//!
//! Cooldown windows are tracked per direction so a burst of scale-ups
//! does not delay a later scale-down, and vice versa.

pub mod cluster;
pub mod control_loop;
pub mod coordinator;
pub mod probe;
pub mod queue;
pub mod scaler;

#[cfg(test)]
mod testing;

pub use cluster::ClusterController;
pub use control_loop::{ControlLoop, ControlLoopState, LoopPhase, TickOutcome};
pub use coordinator::GracefulScaleCoordinator;
pub use probe::WorkerActivityProbe;
pub use queue::{QueueMetricsProvider, QUEUE_READ_TIMEOUT};
pub use scaler::compute_target;
