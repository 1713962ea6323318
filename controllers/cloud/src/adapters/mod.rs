//! External client adapters, one per managed kind
//!
//! Each adapter implements [`ExternalClient`] over the cloud gateway traits. The
//! [`CloudKind`] trait ties a CRD type to its adapter so one generic connecter and
//! one generic watcher serve every kind.

pub mod iam_role;
pub mod internet_gateway;
pub mod kubernetes_cluster;
pub mod role_policy_attachment;
pub mod security_group;
pub mod subnet;
pub mod vpc;

use std::sync::Arc;

use cloud_client::{CloudClientTrait, CloudError};
use crds::Managed;
use kube::ResourceExt;
use managed_runtime::{ExternalClient, ExternalError};

/// A managed kind provisioned through the cloud gateway
pub trait CloudKind: Managed {
    /// Adapter for this kind over an authenticated client
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>>;

    /// Region the resource must be provisioned in, when it is not the provider's
    fn region(&self) -> Option<&str> {
        None
    }
}

/// Map a gateway failure onto the reconcile loop's error taxonomy
///
/// Rejected requests are terminal; credentials, throttling and transport failures are
/// retried because they can clear up without a spec change.
pub fn classify(err: CloudError) -> ExternalError {
    match err {
        CloudError::NotFound(message) => ExternalError::NotFound(message),
        CloudError::AlreadyExists(message) => ExternalError::AlreadyExists(message),
        CloudError::InvalidRequest(_) => ExternalError::Terminal(err.to_string()),
        other => ExternalError::Transient(other.to_string()),
    }
}

/// `Ok(None)` for a not-found answer
pub(crate) fn found<T>(res: Result<T, CloudError>) -> Result<Option<T>, ExternalError> {
    match res {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(classify(err)),
    }
}

/// Treat a not-found answer to a delete as success
pub(crate) fn ignore_not_found(res: Result<(), CloudError>) -> Result<(), ExternalError> {
    found(res).map(|_| ())
}

/// A spec field that must be set (literally or by a resolved reference) before provisioning
pub(crate) fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ExternalError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ExternalError::Terminal(format!("spec.{field} is not set")))
}

/// Idempotency token sent with a create, derived from the resource uid
///
/// Every pass for the same object sends the same token, so a create whose outcome
/// was never recorded can be found again instead of repeated.
pub(crate) fn client_token<K: Managed>(resource: &K) -> Result<String, ExternalError> {
    resource
        .uid()
        .map(|uid| format!("cloudops-{uid}"))
        .ok_or_else(|| ExternalError::Terminal("resource has no uid yet".to_string()))
}

/// Provider identifier recorded in status, if any
pub(crate) fn recorded(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}
