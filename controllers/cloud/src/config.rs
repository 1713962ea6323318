//! Controller configuration from environment variables

use std::time::Duration;

use managed_runtime::RequeuePolicy;

use crate::error::ControllerError;

/// Settings read once at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace whose managed resources are watched
    pub namespace: String,
    pub requeue: RequeuePolicy,
    /// Deadline for a single reconcile pass
    pub pass_timeout: Duration,
    /// Concurrent passes per managed kind
    pub concurrency: u16,
    pub metrics_port: u16,
    /// Gateway URL taking precedence over the endpoint in provider credentials
    pub endpoint_override: Option<String>,
}

impl ControllerConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let short_wait = parse_number(&var, "SHORT_WAIT_SECS", 30u64)?;
        let long_wait = parse_number(&var, "LONG_WAIT_SECS", 60u64)?;
        let pass_timeout = parse_number(&var, "PASS_TIMEOUT_SECS", 120u64)?;
        let concurrency = parse_number(&var, "RECONCILE_CONCURRENCY", 3u16)?;
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }
        if pass_timeout == 0 {
            return Err(ControllerError::InvalidConfig(
                "PASS_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            namespace: var("WATCH_NAMESPACE").unwrap_or_else(|| "default".to_string()),
            requeue: RequeuePolicy {
                short_wait: Duration::from_secs(short_wait),
                long_wait: Duration::from_secs(long_wait),
            },
            pass_timeout: Duration::from_secs(pass_timeout),
            concurrency,
            metrics_port: parse_number(&var, "METRICS_PORT", 8080u16)?,
            endpoint_override: var("CLOUD_ENDPOINT_OVERRIDE"),
        })
    }
}

fn parse_number<T, F>(var: &F, key: &str, default: T) -> Result<T, ControllerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| {
            ControllerError::InvalidConfig(format!("{key}={raw:?} is not a valid number: {e}"))
        }),
    }
}
