//! Namespace discovery.

use std::path::Path;

use tracing::warn;

/// Mounted by Kubernetes into every pod with a service account.
pub const SERVICE_ACCOUNT_NAMESPACE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// The namespace this process runs in.
///
/// Reads the service-account file, then `KUBERNETES_NAMESPACE`, then
/// falls back to `default`.
pub fn resolve_namespace() -> String {
    resolve_namespace_from(
        Path::new(SERVICE_ACCOUNT_NAMESPACE),
        std::env::var("KUBERNETES_NAMESPACE").ok(),
    )
}

pub fn resolve_namespace_from(path: &Path, env_fallback: Option<String>) -> String {
    match std::fs::read_to_string(path) {
        Ok(ns) if !ns.trim().is_empty() => return ns.trim().to_string(),
        Ok(_) => warn!(path = %path.display(), "service-account namespace file is empty"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to read service-account namespace"),
    }

    let namespace = env_fallback
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| "default".to_string());
    warn!(%namespace, "using fallback namespace");
    namespace
}
