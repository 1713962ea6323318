//! CloudOps CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for CloudOps managed resources.
//!
//! Every managed kind carries the same envelope:
//! - a [`ResourceSpec`] flattened into its spec (provider reference, connection
//!   secret target, reclaim policy and attribute references)
//! - a [`Conditions`] list in its status
//!
//! The [`Managed`] trait exposes that envelope generically so one reconcile
//! loop can drive every kind.

pub mod conditions;
pub mod references;
pub mod common;
pub mod managed;
pub mod provider_config;
pub mod network;
pub mod identity;
pub mod compute;

pub use conditions::*;
pub use references::*;
pub use common::*;
pub use managed::*;
pub use provider_config::*;
pub use network::*;
pub use identity::*;
pub use compute::*;

/// API group shared by every CloudOps CRD
pub const API_GROUP: &str = "cloudops.microscaler.io";

/// API version shared by every CloudOps CRD
pub const API_VERSION: &str = "v1alpha1";
