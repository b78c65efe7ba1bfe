//! queuescale-core — shared types for the queue-driven worker autoscaler.
//!
//! Holds the validated [`ScalerConfig`], the read-only views of cluster
//! objects ([`WorkerPod`], [`DeploymentInfo`]) and the async traits through
//! which the autoscaler talks to the outside world:
//!
//! ```text
//! OrchestratorApi      deployment + pod reads, replica patch, pod delete
//! BrokerManagementApi  backlog of a named queue
//! WorkerInspector      active tasks per worker identity
//! ```
//!
//! Implementations only report failures. Deciding what a failure means
//! (scale nothing, assume busy, skip the tick) belongs to the autoscaler.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use api::{BrokerManagementApi, OrchestratorApi, WorkerInspector};
pub use config::{BrokerConfig, Credentials, InspectConfig, ScalerConfig};
pub use error::{ApiError, ApiResult, ConfigError};
pub use types::*;
