//! Controller-specific error types.
//!
//! Errors of the reconcile loop itself live in `managed_runtime`; this module covers
//! start-up, configuration and the watcher plumbing around it.

use kube::Error as KubeError;
use managed_runtime::ReconcileError;
use thiserror::Error;

/// Errors that can occur in the CloudOps controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// A reconcile pass could not record its outcome
    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registration or probe server failure
    #[error("Metrics server error: {0}")]
    Server(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
