//! External client adapter boundary
//!
//! One [`ExternalConnecter`] per managed kind opens a provider session; the returned
//! [`ExternalClient`] observes, creates, updates and deletes the external resource.
//! Adapters may record provider identifiers and Ready conditions on the resource they
//! are handed; the loop persists whatever they leave there.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::context::PassContext;
use crate::error::ExternalError;

/// Endpoint and credential material keyed by name
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// Result of observing the external resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    pub connection_details: ConnectionDetails,
}

impl ExternalObservation {
    /// The external resource does not exist
    pub fn absent() -> Self {
        Self::default()
    }

    /// The external resource exists; `up_to_date` says whether it matches the spec
    pub fn present(up_to_date: bool) -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            connection_details: ConnectionDetails::new(),
        }
    }

    /// Attach connection details to publish
    pub fn with_details(mut self, details: ConnectionDetails) -> Self {
        self.connection_details = details;
        self
    }
}

/// Outcome of a successful create
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

/// Outcome of a successful update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Opens a provider session for a managed resource
#[async_trait]
pub trait ExternalConnecter<K: Send + Sync>: Send + Sync {
    async fn connect(&self, ctx: &PassContext, resource: &K) -> Result<Box<dyn ExternalClient<K>>, ExternalError>;
}

/// Provider operations for one managed kind
///
/// `create` must treat an already existing resource as success and `delete` must
/// treat an absent one as success, because passes for the same resource may overlap.
#[async_trait]
pub trait ExternalClient<K: Send + Sync>: Send + Sync {
    /// Read-only towards the provider
    async fn observe(&self, ctx: &PassContext, resource: &mut K) -> Result<ExternalObservation, ExternalError>;

    async fn create(&self, ctx: &PassContext, resource: &mut K) -> Result<ExternalCreation, ExternalError>;

    /// Apply the minimal delta between desired and observed state
    async fn update(&self, ctx: &PassContext, resource: &mut K) -> Result<ExternalUpdate, ExternalError>;

    async fn delete(&self, ctx: &PassContext, resource: &mut K) -> Result<(), ExternalError>;
}
