//! Scaler configuration.
//!
//! Values come from environment variables, optionally layered over a TOML
//! file using the same keys in lower snake case (`min_replicas = 3`).
//! The environment wins over the file; defaults fill whatever is left.
//! The result is validated once and never mutated afterwards.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use http::Uri;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::RemovalOrder;

const DEFAULT_INSPECT_URL: &str = "http://localhost:5555/api/workers?refresh=1";

/// Upper bound on the sleep after a failed tick.
const MAX_TICK_BACKOFF: Duration = Duration::from_secs(60);

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where the broker's management API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub management_port: u16,
    pub vhost: String,
    pub credentials: Credentials,
}

impl BrokerConfig {
    /// `host:port` of the management listener.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.management_port)
    }
}

/// Where live worker activity can be inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectConfig {
    pub url: Uri,
    pub credentials: Option<Credentials>,
}

/// Validated scaling parameters for one worker deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalerConfig {
    /// Backlog above which we scale up.
    pub threshold: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub check_interval: Duration,
    pub scale_up_cooldown: Duration,
    pub scale_down_cooldown: Duration,
    pub deployment_name: String,
    pub queue_name: String,
    pub scale_up_factor: f64,
    pub scale_down_factor: f64,
    pub grace_period_seconds: u32,
    pub removal_order: RemovalOrder,
    /// Prefixed to a pod name to get the worker's identity.
    pub worker_name_prefix: String,
    pub broker: BrokerConfig,
    pub inspect: InspectConfig,
}

impl ScalerConfig {
    /// Load from the process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from the process environment layered over an optional TOML file.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match file {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::from_layers(|key| std::env::var(key).ok(), &file)
    }

    /// Build and validate a config from an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_layers(lookup, &FileConfig::default())
    }

    /// `lookup` wins over `file`; defaults fill the rest.
    fn from_layers<F>(lookup: F, file: &FileConfig) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let text = |key: &'static str, from_file: &Option<String>| {
            get(key).or_else(|| from_file.clone().filter(|v| !v.trim().is_empty()))
        };

        let broker = BrokerConfig {
            host: text("BROKER_HOST", &file.broker_host)
                .unwrap_or_else(|| "localhost".to_string()),
            management_port: parse_or(&get, "BROKER_MANAGEMENT_PORT", file.broker_management_port.unwrap_or(15672))?,
            vhost: text("BROKER_VHOST", &file.broker_vhost).unwrap_or_else(|| "/".to_string()),
            credentials: Credentials {
                username: text("BROKER_USER", &file.broker_user)
                    .unwrap_or_else(|| "guest".to_string()),
                password: text("BROKER_PASSWORD", &file.broker_password)
                    .unwrap_or_else(|| "guest".to_string()),
            },
        };

        let inspect_url = text("INSPECT_URL", &file.inspect_url)
            .unwrap_or_else(|| DEFAULT_INSPECT_URL.to_string());
        let inspect = InspectConfig {
            url: Uri::from_str(&inspect_url).map_err(|e| ConfigError::Invalid {
                key: "INSPECT_URL",
                reason: e.to_string(),
            })?,
            credentials: text("INSPECT_USER", &file.inspect_user).map(|username| Credentials {
                username,
                password: text("INSPECT_PASSWORD", &file.inspect_password).unwrap_or_default(),
            }),
        };

        let config = Self {
            threshold: parse_or(&get, "THRESHOLD", file.threshold.unwrap_or(6))?,
            min_replicas: parse_or(&get, "MIN_REPLICAS", file.min_replicas.unwrap_or(3))?,
            max_replicas: parse_or(&get, "MAX_REPLICAS", file.max_replicas.unwrap_or(10))?,
            check_interval: Duration::from_secs(parse_or(&get, "CHECK_INTERVAL", file.check_interval.unwrap_or(5))?),
            scale_up_cooldown: Duration::from_secs(parse_or(&get, "SCALE_UP_COOLDOWN", file.scale_up_cooldown.unwrap_or(5))?),
            scale_down_cooldown: Duration::from_secs(parse_or(
                &get,
                "SCALE_DOWN_COOLDOWN",
                file.scale_down_cooldown.unwrap_or(60),
            )?),
            deployment_name: text("DEPLOYMENT_NAME", &file.deployment_name).unwrap_or_default(),
            queue_name: text("QUEUE_NAME", &file.queue_name).unwrap_or_default(),
            scale_up_factor: parse_or(&get, "SCALE_UP_FACTOR", file.scale_up_factor.unwrap_or(1.0))?,
            scale_down_factor: parse_or(&get, "SCALE_DOWN_FACTOR", file.scale_down_factor.unwrap_or(1.0))?,
            grace_period_seconds: parse_or(&get, "GRACE_PERIOD_SECONDS", file.grace_period_seconds.unwrap_or(30))?,
            removal_order: parse_or(&get, "SCALE_DOWN_ORDER", file.scale_down_order.unwrap_or_default())?,
            worker_name_prefix: text("WORKER_NAME_PREFIX", &file.worker_name_prefix)
                .unwrap_or_else(|| "celery@".to_string()),
            broker,
            inspect,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every invariant. Called by all constructors; call it again
    /// after building a config by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deployment_name.is_empty() {
            return Err(ConfigError::Missing("DEPLOYMENT_NAME"));
        }
        if self.queue_name.is_empty() {
            return Err(ConfigError::Missing("QUEUE_NAME"));
        }
        if self.min_replicas < 1 {
            return Err(ConfigError::Invalid {
                key: "MIN_REPLICAS",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_replicas < self.min_replicas {
            return Err(ConfigError::Invalid {
                key: "MAX_REPLICAS",
                reason: "must be greater than or equal to MIN_REPLICAS".to_string(),
            });
        }
        if self.threshold < 1 {
            return Err(ConfigError::Invalid {
                key: "THRESHOLD",
                reason: "must be at least 1".to_string(),
            });
        }
        for (key, factor) in [
            ("SCALE_UP_FACTOR", self.scale_up_factor),
            ("SCALE_DOWN_FACTOR", self.scale_down_factor),
        ] {
            if !factor.is_finite() {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("must be a finite number, got {factor}"),
                });
            }
        }
        if self.inspect.url.scheme_str() != Some("http") || self.inspect.url.authority().is_none() {
            return Err(ConfigError::Invalid {
                key: "INSPECT_URL",
                reason: format!("expected an http://host:port/... URL, got `{}`", self.inspect.url),
            });
        }
        Ok(())
    }

    /// Backlog below which we scale down: half the threshold, at least 1.
    pub fn scale_down_threshold(&self) -> u32 {
        (self.threshold / 2).max(1)
    }

    /// Sleep after a tick that failed unexpectedly.
    pub fn tick_error_backoff(&self) -> Duration {
        (self.check_interval * 2).min(MAX_TICK_BACKOFF)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&'static str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("`{raw}`: {e}"),
        }),
        None => Ok(default),
    }
}

/// The optional TOML layer. Keys are the environment names in lower case.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    threshold: Option<u32>,
    min_replicas: Option<u32>,
    max_replicas: Option<u32>,
    check_interval: Option<u64>,
    scale_up_cooldown: Option<u64>,
    scale_down_cooldown: Option<u64>,
    deployment_name: Option<String>,
    queue_name: Option<String>,
    scale_up_factor: Option<f64>,
    scale_down_factor: Option<f64>,
    grace_period_seconds: Option<u32>,
    scale_down_order: Option<RemovalOrder>,
    worker_name_prefix: Option<String>,
    broker_host: Option<String>,
    broker_management_port: Option<u16>,
    broker_user: Option<String>,
    broker_password: Option<String>,
    broker_vhost: Option<String>,
    inspect_url: Option<String>,
    inspect_user: Option<String>,
    inspect_password: Option<String>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let file_err = |reason: String| ConfigError::File {
            path: path.to_path_buf(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| file_err(e.to_string()))?;
        toml::from_str(&content).map_err(|e| file_err(e.to_string()))
    }
}
