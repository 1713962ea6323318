//! Error taxonomy of the reconcile loop and its collaborators

use std::time::Duration;

use thiserror::Error;

/// A guarded call did not complete
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum Interrupted {
    #[error("reconcile pass cancelled")]
    Cancelled,

    #[error("reconcile pass exceeded its {0:?} deadline")]
    TimedOut(Duration),
}

/// Failures reported by an external client adapter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    /// Network, throttling or provider-busy failures; retried after a short wait
    #[error("{0}")]
    Transient(String),

    /// The provider rejected the request as invalid; retried only after the spec changes
    #[error("{0}")]
    Terminal(String),

    /// The external resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The external resource already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The pass was cancelled while the call was in flight
    #[error("cancelled")]
    Cancelled,
}

impl ExternalError {
    /// The external resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExternalError::NotFound(_))
    }

    /// The external resource already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ExternalError::AlreadyExists(_))
    }

    /// Retrying cannot help until the spec changes
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExternalError::Terminal(_))
    }

    /// The pass was cancelled before the call finished
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExternalError::Cancelled)
    }
}

impl From<Interrupted> for ExternalError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::Cancelled => ExternalError::Cancelled,
            Interrupted::TimedOut(_) => ExternalError::Transient(value.to_string()),
        }
    }
}

/// Failures while resolving attribute references
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Reading a referenced resource failed for a reason other than absence
    #[error("failed to read {target}: {message}")]
    Read { target: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The resolved value could not be written into the spec field
    #[error("cannot assign {field}: {message}")]
    Assign { field: String, message: String },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

/// Failures reading or writing managed resources
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The resource changed since it was read
    #[error("conflict writing {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),
}

/// Failures publishing or removing connection secrets
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Sink(String),
}

/// Failures reading provider credentials
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("ProviderConfig {0} not found")]
    ProviderNotFound(String),

    #[error("credentials secret {0} not found")]
    SecretNotFound(String),

    #[error("credentials secret {secret} has no key {key}")]
    MissingKey { secret: String, key: String },
}

/// Errors returned from a reconcile pass to the scheduler
///
/// Everything else is reflected as a condition on the resource and turned into a
/// requeue decision. These are the cases where the pass could not even record its
/// outcome, so the scheduler's own error backoff is the retry mechanism.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Writing spec, finalizers or status back failed
    #[error("failed to persist resource: {0}")]
    Persist(#[source] StoreError),

    /// Reading the resource failed
    #[error("failed to read resource: {0}")]
    Fetch(#[source] StoreError),

    /// The pass was cancelled or ran out of time
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}
