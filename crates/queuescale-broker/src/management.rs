//! Queue backlog from a RabbitMQ-style management API.

use std::time::Duration;

use async_trait::async_trait;
use http::Uri;

use queuescale_core::{
    ApiError, ApiResult, BrokerConfig, BrokerManagementApi, Credentials, QueueStatus,
};

use crate::client::{encode_path_segment, get_json};

/// Upper bound on a single queue status request.
pub const QUEUE_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads queue status over HTTP with basic auth.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    address: String,
    vhost: String,
    credentials: Credentials,
    timeout: Duration,
}

impl ManagementClient {
    pub fn new(config: &BrokerConfig) -> Self {
        Self {
            address: config.address(),
            vhost: config.vhost.clone(),
            credentials: config.credentials.clone(),
            timeout: QUEUE_STATUS_TIMEOUT,
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn queue_uri(&self, queue: &str) -> ApiResult<Uri> {
        let uri = format!(
            "http://{}/api/queues/{}/{}",
            self.address,
            encode_path_segment(&self.vhost),
            encode_path_segment(queue)
        );
        uri.parse()
            .map_err(|e: http::uri::InvalidUri| ApiError::Http(format!("`{uri}`: {e}")))
    }
}

#[async_trait]
impl BrokerManagementApi for ManagementClient {
    async fn queue_status(&self, queue: &str) -> ApiResult<QueueStatus> {
        let uri = self.queue_uri(queue)?;
        get_json(&uri, Some(&self.credentials), self.timeout).await
    }
}
