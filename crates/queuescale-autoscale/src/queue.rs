//! Queue metrics — backlog depth with a fail-to-zero policy.
//!
//! When the broker cannot be read the backlog is reported as 0. Losing
//! visibility then leans toward not scaling up rather than stalling the
//! loop or growing without evidence.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use queuescale_core::BrokerManagementApi;

/// Upper bound on one backlog read, whatever the transport does.
pub const QUEUE_READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct QueueMetricsProvider {
    api: Arc<dyn BrokerManagementApi>,
    timeout: Duration,
}

impl QueueMetricsProvider {
    pub fn new(api: Arc<dyn BrokerManagementApi>) -> Self {
        Self {
            api,
            timeout: QUEUE_READ_TIMEOUT,
        }
    }

    /// Messages ready for delivery on `queue`; 0 on any failure.
    pub async fn queue_length(&self, queue: &str) -> u64 {
        match tokio::time::timeout(self.timeout, self.api.queue_status(queue)).await {
            Ok(Ok(status)) => {
                debug!(%queue, ready = status.messages_ready, "read queue length");
                status.messages_ready
            }
            Ok(Err(e)) => {
                error!(%queue, error = %e, "failed to read queue length, assuming empty");
                0
            }
            Err(_) => {
                error!(%queue, timeout_secs = self.timeout.as_secs(), "queue length read timed out, assuming empty");
                0
            }
        }
    }
}
