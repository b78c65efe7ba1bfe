//! queuescale-cluster — Kubernetes access for the autoscaler.
//!
//! [`KubeOrchestrator`] implements `OrchestratorApi` against one namespace:
//! deployment reads, label-selected pod listing, replica patches through
//! the `scale` subresource, and pod deletion with a grace period.

pub mod kube_api;
pub mod namespace;

pub use kube_api::KubeOrchestrator;
pub use namespace::resolve_namespace;
