//! Live worker inspection over HTTP.
//!
//! Accepts two response shapes keyed by worker identity:
//!
//! ```text
//! { "celery@worker-0": [ {"id": "..."}, ... ] }               plain active map
//! { "celery@worker-0": { "active": [ ... ], "stats": ... } }   Flower /api/workers
//! ```
//!
//! A worker listed without an `active` field keeps its entry with unknown
//! activity (`None`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use http::Uri;
use serde_json::Value;

use queuescale_core::{
    ActiveTasks, ApiError, ApiResult, Credentials, InspectConfig, WorkerInspector,
};

use crate::client::get_json;

/// Upper bound on a single inspection request.
pub const INSPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Queries the inspection endpoint for active tasks.
#[derive(Debug, Clone)]
pub struct InspectClient {
    url: Uri,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl InspectClient {
    pub fn new(config: &InspectConfig) -> Self {
        Self {
            url: config.url.clone(),
            credentials: config.credentials.clone(),
            timeout: INSPECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl WorkerInspector for InspectClient {
    async fn active_tasks(&self) -> ApiResult<ActiveTasks> {
        let raw: HashMap<String, Value> =
            get_json(&self.url, self.credentials.as_ref(), self.timeout).await?;
        parse_active_tasks(raw)
    }
}

fn parse_active_tasks(raw: HashMap<String, Value>) -> ApiResult<ActiveTasks> {
    let mut active = ActiveTasks::new();
    for (worker, entry) in raw {
        let tasks = match entry {
            Value::Array(tasks) => Some(tasks),
            Value::Object(mut fields) => match fields.remove("active") {
                Some(Value::Array(tasks)) => Some(tasks),
                Some(Value::Null) | None => None,
                Some(other) => {
                    return Err(ApiError::Decode(format!(
                        "`active` for {worker} is not a list: {other}"
                    )));
                }
            },
            Value::Null => None,
            other => {
                return Err(ApiError::Decode(format!(
                    "unexpected entry for {worker}: {other}"
                )));
            }
        };
        let ids = tasks.map(|tasks| tasks.iter().map(task_id).collect());
        active.insert(worker, ids);
    }
    Ok(active)
}

fn task_id(task: &Value) -> String {
    match task {
        Value::String(id) => id.clone(),
        Value::Object(fields) => fields
            .get("id")
            .or_else(|| fields.get("uuid"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| task.to_string()),
        other => other.to_string(),
    }
}
